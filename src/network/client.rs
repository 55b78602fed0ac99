//! Blocking client
//!
//! Speaks the wire protocol to a running server.

use std::io::{BufReader, BufWriter};
use std::net::TcpStream;

use crate::error::{CaskError, Result};
use crate::protocol::{decode_pairs, read_response, write_command, Command, Response, Status};
use crate::store::StoreStats;

/// A connection to a CaskKV server
pub struct Client {
    reader: BufReader<TcpStream>,
    writer: BufWriter<TcpStream>,
}

impl Client {
    /// Connect to `addr` (host:port)
    pub fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr)
            .map_err(|e| CaskError::Network(format!("Cannot connect to {}: {}", addr, e)))?;
        stream.set_nodelay(true)?;

        Ok(Self {
            reader: BufReader::new(stream.try_clone()?),
            writer: BufWriter::new(stream),
        })
    }

    /// Send one command and wait for its response
    pub fn call(&mut self, command: &Command) -> Result<Response> {
        write_command(&mut self.writer, command)?;
        read_response(&mut self.reader)
    }

    pub fn get(&mut self, key: &str) -> Result<Option<Vec<u8>>> {
        let response = self.call(&Command::Get {
            key: key.to_string(),
        })?;
        match response.status {
            Status::Ok => Ok(Some(response.into_payload())),
            Status::NotFound => Ok(None),
            Status::Error => Err(server_error(response)),
        }
    }

    pub fn put(&mut self, key: &str, value: &[u8]) -> Result<()> {
        self.expect_ok(&Command::Put {
            key: key.to_string(),
            value: value.to_vec(),
        })
    }

    pub fn delete(&mut self, key: &str) -> Result<()> {
        self.expect_ok(&Command::Delete {
            key: key.to_string(),
        })
    }

    pub fn batch_put(&mut self, items: Vec<(String, Vec<u8>)>) -> Result<()> {
        self.expect_ok(&Command::BatchPut { items })
    }

    pub fn range(&mut self, start: &str, end: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let response = self.call(&Command::Range {
            start: start.to_string(),
            end: end.to_string(),
        })?;
        match response.status {
            Status::Ok => decode_pairs(&response.into_payload()),
            _ => Err(server_error(response)),
        }
    }

    pub fn ping(&mut self) -> Result<()> {
        self.expect_ok(&Command::Ping)
    }

    pub fn stats(&mut self) -> Result<StoreStats> {
        let response = self.call(&Command::Stats)?;
        match response.status {
            Status::Ok => Ok(bincode::deserialize(&response.into_payload())?),
            _ => Err(server_error(response)),
        }
    }

    fn expect_ok(&mut self, command: &Command) -> Result<()> {
        let response = self.call(command)?;
        match response.status {
            Status::Ok => Ok(()),
            _ => Err(server_error(response)),
        }
    }
}

fn server_error(response: Response) -> CaskError {
    let status = response.status;
    let message = String::from_utf8_lossy(&response.into_payload()).into_owned();
    CaskError::Network(format!("Server returned {:?}: {}", status, message))
}
