//! Upstream name server probing. The resolver never forwards to a public
//! recursive resolver — it speaks TCP/53 only, non-recursive, one query
//! per connection, straight to whatever authoritative server is the
//! current candidate.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

use crate::packet::Message;

/// Every upstream socket operation shares this one deadline — there is no
/// separate "connect timeout" vs. "read timeout," matching the single
/// 5-second cancellation primitive described for the whole system.
pub const UPSTREAM_TIMEOUT: Duration = Duration::from_secs(5);

/// Open one TCP connection to `server:53`, send `query` (already built
/// non-recursive), read back one length-prefixed response, and parse it.
/// Every failure mode — connect, write, read, or malformed response bytes —
/// is surfaced as an error for the caller to classify as a per-candidate
/// failure and move on to the next server.
pub async fn probe(server: IpAddr, query: &Message) -> Result<Message> {
    let addr = SocketAddr::from((server, 53));
    let mut stream = timeout(UPSTREAM_TIMEOUT, TcpStream::connect(addr))
        .await
        .context("connect timed out")?
        .with_context(|| format!("failed to connect to {}", addr))?;

    let bytes = query.serialize();
    if bytes.len() > u16::MAX as usize {
        bail!("query too large to frame over TCP: {} bytes", bytes.len());
    }
    let len_prefix = (bytes.len() as u16).to_be_bytes();

    timeout(UPSTREAM_TIMEOUT, async {
        stream.write_all(&len_prefix).await?;
        stream.write_all(&bytes).await
    })
    .await
    .context("write timed out")?
    .context("failed to write query")?;

    let mut len_buf = [0u8; 2];
    timeout(UPSTREAM_TIMEOUT, stream.read_exact(&mut len_buf))
        .await
        .context("read timed out")?
        .context("failed to read response length prefix")?;
    let response_len = u16::from_be_bytes(len_buf) as usize;

    let mut response_buf = vec![0u8; response_len];
    timeout(UPSTREAM_TIMEOUT, stream.read_exact(&mut response_buf))
        .await
        .context("read timed out")?
        .context("failed to read response body")?;

    let (message, _) = Message::parse(&response_buf).context("upstream sent a malformed response")?;
    Ok(message)
}

/// Build the non-recursive (RD=0) query to send to a candidate server for
/// the given question, reusing the client's question verbatim.
pub fn build_probe_query(question: &crate::packet::Question, id: u16) -> Message {
    use crate::packet::Header;
    Message {
        header: Header {
            id,
            flags: 0, // QR=0 (query), Opcode=0 (standard), RD=0 (non-recursive)
            qd_count: 1,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        },
        questions: vec![question.clone()],
        answers: Vec::new(),
        authorities: Vec::new(),
        additionals: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::{RecordClass, RecordType};

    #[test]
    fn probe_query_is_non_recursive() {
        let question = crate::packet::Question {
            name: "example.com.".to_string(),
            qtype: RecordType::A,
            qclass: RecordClass::IN,
        };
        let query = build_probe_query(&question, 0x4242);
        assert!(!query.header.recursion_desired());
        assert!(!query.header.is_response());
        assert_eq!(query.header.id, 0x4242);
        assert_eq!(query.questions.len(), 1);
    }
}
