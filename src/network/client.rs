//! TCP Client
//!
//! Sends one request at a time and waits for its reply.

use tokio::io::BufReader;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;

use crate::error::{OptiError, Result};
use crate::protocol::{read_frame, write_frame, Request, Response};
use crate::txn::Transaction;

pub struct Client {
    reader: BufReader<OwnedReadHalf>,
    writer: OwnedWriteHalf,
}

impl Client {
    pub async fn connect(addr: &str) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        stream.set_nodelay(true)?;
        let (read_half, write_half) = stream.into_split();

        Ok(Self {
            reader: BufReader::new(read_half),
            writer: write_half,
        })
    }

    pub async fn send(&mut self, request: &Request) -> Result<Response> {
        write_frame(&mut self.writer, request).await?;
        read_frame(&mut self.reader)
            .await?
            .ok_or_else(|| OptiError::Network("server closed the connection".to_string()))
    }

    pub async fn execute(&mut self, txn: &Transaction) -> Result<Response> {
        self.send(&Request::from_transaction(txn)).await
    }
}
