//! DNS wire format parser and serializer (RFC 1035).
//!
//! Parses directly from `&[u8]` with a manual offset cursor; no intermediate
//! zero-copy buffer abstraction, since names routinely need decompressing
//! into an owned `String` anyway (see the NS-rdata normalization below).

use std::collections::HashSet;
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::error::DnsParseError;
use crate::records::{DnsRecord, RData, RecordClass, RecordType};

/// A pointer chain longer than this is treated as a loop, not a shortcut.
pub const MAX_POINTER_JUMPS: usize = 128;

pub const RCODE_NOERROR: u8 = 0;
pub const RCODE_FORMERR: u8 = 1;
pub const RCODE_SERVFAIL: u8 = 2;
pub const RCODE_NXDOMAIN: u8 = 3;
pub const RCODE_NOTIMP: u8 = 4;
pub const RCODE_REFUSED: u8 = 5;

/// Flag bit positions, MSB = index 0 of the 16-bit field: QR=0, Opcode=1..4,
/// AA=5, TC=6, RD=7, RA=8, Z=9..11, RCODE=12..15.
const FLAG_QR: u16 = 0x8000;
const FLAG_AA: u16 = 0x0400;
const FLAG_TC: u16 = 0x0200;
const FLAG_RD: u16 = 0x0100;
const FLAG_RA: u16 = 0x0080;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub id: u16,
    pub flags: u16,
    pub qd_count: u16,
    pub an_count: u16,
    pub ns_count: u16,
    pub ar_count: u16,
}

impl Header {
    pub fn is_response(&self) -> bool {
        self.flags & FLAG_QR != 0
    }
    pub fn opcode(&self) -> u8 {
        ((self.flags >> 11) & 0xF) as u8
    }
    pub fn is_authoritative(&self) -> bool {
        self.flags & FLAG_AA != 0
    }
    pub fn is_truncated(&self) -> bool {
        self.flags & FLAG_TC != 0
    }
    pub fn recursion_desired(&self) -> bool {
        self.flags & FLAG_RD != 0
    }
    pub fn recursion_available(&self) -> bool {
        self.flags & FLAG_RA != 0
    }
    pub fn rcode(&self) -> u8 {
        (self.flags & 0xF) as u8
    }

    /// Flag mutation never happens in place — every `with_*` returns a fresh
    /// `Header` rather than flipping bits on `self`.
    fn with_flag(&self, mask: u16, value: bool) -> Header {
        let mut h = self.clone();
        if value {
            h.flags |= mask;
        } else {
            h.flags &= !mask;
        }
        h
    }

    pub fn with_qr(&self, value: bool) -> Header {
        self.with_flag(FLAG_QR, value)
    }
    pub fn with_aa(&self, value: bool) -> Header {
        self.with_flag(FLAG_AA, value)
    }
    pub fn with_tc(&self, value: bool) -> Header {
        self.with_flag(FLAG_TC, value)
    }
    pub fn with_ra(&self, value: bool) -> Header {
        self.with_flag(FLAG_RA, value)
    }
    pub fn with_rcode(&self, rcode: u8) -> Header {
        let mut h = self.clone();
        h.flags = (h.flags & !0x000F) | (rcode as u16 & 0xF);
        h
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Question {
    pub name: String,
    pub qtype: RecordType,
    pub qclass: RecordClass,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub header: Header,
    pub questions: Vec<Question>,
    pub answers: Vec<DnsRecord>,
    pub authorities: Vec<DnsRecord>,
    pub additionals: Vec<DnsRecord>,
}

impl Message {
    pub fn parse(buf: &[u8]) -> Result<(Message, usize), DnsParseError> {
        let header = parse_header(buf)?;
        let mut offset = 12;

        let mut questions = Vec::with_capacity(header.qd_count as usize);
        for _ in 0..header.qd_count {
            let (name, new_offset) = parse_name(buf, offset)?;
            offset = new_offset;
            if offset + 4 > buf.len() {
                return Err(DnsParseError::Truncated(offset));
            }
            let qtype = RecordType::from_u16(u16::from_be_bytes([buf[offset], buf[offset + 1]]));
            let qclass =
                RecordClass::from_u16(u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]));
            offset += 4;
            questions.push(Question {
                name: name.to_lowercase(),
                qtype,
                qclass,
            });
        }

        let mut answers = Vec::new();
        offset = parse_records(buf, offset, header.an_count as usize, &mut answers)?;
        let mut authorities = Vec::new();
        offset = parse_records(buf, offset, header.ns_count as usize, &mut authorities)?;
        let mut additionals = Vec::new();
        offset = parse_records(buf, offset, header.ar_count as usize, &mut additionals)?;

        Ok((
            Message {
                header,
                questions,
                answers,
                authorities,
                additionals,
            },
            offset,
        ))
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(512);
        buf.extend_from_slice(&self.header.id.to_be_bytes());
        buf.extend_from_slice(&self.header.flags.to_be_bytes());
        // Counts are always derived from the sections actually present, not
        // from whatever the header's count fields happen to hold — that way
        // a blanked or rebuilt message can never serialize inconsistent
        // counts.
        buf.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.answers.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.authorities.len() as u16).to_be_bytes());
        buf.extend_from_slice(&(self.additionals.len() as u16).to_be_bytes());

        for q in &self.questions {
            encode_name(&q.name, &mut buf);
            buf.extend_from_slice(&q.qtype.to_u16().to_be_bytes());
            buf.extend_from_slice(&q.qclass.to_u16().to_be_bytes());
        }
        for record in self
            .answers
            .iter()
            .chain(self.authorities.iter())
            .chain(self.additionals.iter())
        {
            encode_record(record, &mut buf);
        }
        buf
    }

    /// A response shell derived from this message: same id and questions,
    /// all three answer-bearing sections empty, flags set per the
    /// resolver's QR=1/AA=0/RA=1/rcode contract. RD is preserved from the
    /// request since it only reflects what the client asked for.
    pub fn as_response(&self, rcode: u8) -> Message {
        let header = self
            .header
            .with_qr(true)
            .with_aa(false)
            .with_ra(true)
            .with_rcode(rcode);
        Message {
            header,
            questions: self.questions.clone(),
            answers: Vec::new(),
            authorities: Vec::new(),
            additionals: Vec::new(),
        }
    }

    /// A successful response carrying the given answer set.
    pub fn with_answers(&self, answers: Vec<DnsRecord>) -> Message {
        let mut response = self.as_response(RCODE_NOERROR);
        response.answers = answers;
        response
    }
}

fn parse_header(buf: &[u8]) -> Result<Header, DnsParseError> {
    if buf.len() < 12 {
        return Err(DnsParseError::TooShort(buf.len()));
    }
    Ok(Header {
        id: u16::from_be_bytes([buf[0], buf[1]]),
        flags: u16::from_be_bytes([buf[2], buf[3]]),
        qd_count: u16::from_be_bytes([buf[4], buf[5]]),
        an_count: u16::from_be_bytes([buf[6], buf[7]]),
        ns_count: u16::from_be_bytes([buf[8], buf[9]]),
        ar_count: u16::from_be_bytes([buf[10], buf[11]]),
    })
}

/// Decode a DNS name starting at `offset`, following compression pointers.
/// Returns the canonical dotted name (trailing dot; `.` for the root) and
/// the cursor position immediately after the name *as it appears at the
/// call site* (i.e. after a pointer, not after the pointed-to data).
pub fn parse_name(buf: &[u8], mut offset: usize) -> Result<(String, usize), DnsParseError> {
    let mut name = String::with_capacity(64);
    let mut jumped = false;
    let mut end_offset = 0;
    let mut jumps = 0usize;
    let mut visited_pointers: HashSet<usize> = HashSet::new();

    loop {
        if offset >= buf.len() {
            return Err(DnsParseError::Truncated(offset));
        }
        let len = buf[offset] as usize;

        if len & 0xC0 == 0xC0 {
            if offset + 1 >= buf.len() {
                return Err(DnsParseError::Truncated(offset));
            }
            if !jumped {
                end_offset = offset + 2;
            }
            if !visited_pointers.insert(offset) {
                return Err(DnsParseError::CompressionLoop);
            }
            let target = ((len & 0x3F) << 8) | (buf[offset + 1] as usize);
            offset = target;
            jumped = true;
            jumps += 1;
            if jumps > MAX_POINTER_JUMPS {
                return Err(DnsParseError::CompressionLoop);
            }
            continue;
        }

        if len == 0 {
            if !jumped {
                end_offset = offset + 1;
            }
            break;
        }

        if len > 63 {
            return Err(DnsParseError::LabelTooLong(len));
        }

        offset += 1;
        if offset + len > buf.len() {
            return Err(DnsParseError::Truncated(offset));
        }
        if !name.is_empty() {
            name.push('.');
        }
        let label =
            std::str::from_utf8(&buf[offset..offset + len]).map_err(|_| DnsParseError::InvalidUtf8)?;
        name.push_str(label);
        offset += len;

        if name.len() > 253 {
            return Err(DnsParseError::NameTooLong);
        }
    }

    if name.is_empty() {
        Ok((".".to_string(), end_offset))
    } else {
        name.push('.');
        Ok((name, end_offset))
    }
}

/// Encode a name as literal length-prefixed labels; never emits a pointer.
/// Accepts names with or without the canonical trailing dot.
pub fn encode_name(name: &str, buf: &mut Vec<u8>) {
    let trimmed = name.trim_end_matches('.');
    if trimmed.is_empty() {
        buf.push(0);
        return;
    }
    for label in trimmed.split('.') {
        let len = label.len().min(63);
        buf.push(len as u8);
        buf.extend_from_slice(&label.as_bytes()[..len]);
    }
    buf.push(0);
}

fn parse_records(
    buf: &[u8],
    mut offset: usize,
    count: usize,
    out: &mut Vec<DnsRecord>,
) -> Result<usize, DnsParseError> {
    for _ in 0..count {
        let (name, new_offset) = parse_name(buf, offset)?;
        offset = new_offset;

        if offset + 10 > buf.len() {
            return Err(DnsParseError::Truncated(offset));
        }
        let rtype_raw = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
        let rtype = RecordType::from_u16(rtype_raw);
        let class = RecordClass::from_u16(u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]));
        let ttl = u32::from_be_bytes([
            buf[offset + 4],
            buf[offset + 5],
            buf[offset + 6],
            buf[offset + 7],
        ]);
        let rdlength = u16::from_be_bytes([buf[offset + 8], buf[offset + 9]]) as usize;
        offset += 10;

        if offset + rdlength > buf.len() {
            return Err(DnsParseError::Truncated(offset));
        }
        let rdata = parse_rdata(buf, offset, rdlength, rtype)?;
        offset += rdlength;

        // No EDNS(0) support: OPT pseudo-records (type 41) are dropped on
        // the floor rather than cached or answered with.
        if rtype_raw == 41 {
            continue;
        }

        out.push(DnsRecord {
            name: name.to_lowercase(),
            rtype,
            class,
            ttl,
            rdata,
        });
    }
    Ok(offset)
}

/// Decode rdata. `NS` (and the other name-bearing types) are always decoded
/// to an owned canonical name rather than kept as raw bytes — this is the
/// normalization that lets a cached NS row be serialized on its own later,
/// with no access to the packet it came from.
fn parse_rdata(
    buf: &[u8],
    offset: usize,
    rdlength: usize,
    rtype: RecordType,
) -> Result<RData, DnsParseError> {
    match rtype {
        RecordType::A => {
            if rdlength != 4 {
                return Ok(RData::Raw(buf[offset..offset + rdlength].to_vec()));
            }
            Ok(RData::A(Ipv4Addr::new(
                buf[offset],
                buf[offset + 1],
                buf[offset + 2],
                buf[offset + 3],
            )))
        }
        RecordType::AAAA => {
            if rdlength != 16 {
                return Ok(RData::Raw(buf[offset..offset + rdlength].to_vec()));
            }
            let mut octets = [0u8; 16];
            octets.copy_from_slice(&buf[offset..offset + 16]);
            Ok(RData::AAAA(Ipv6Addr::from(octets)))
        }
        RecordType::CNAME | RecordType::PTR | RecordType::NS => {
            let (name, _) = parse_name(buf, offset)?;
            Ok(match rtype {
                RecordType::CNAME => RData::CNAME(name),
                RecordType::PTR => RData::PTR(name),
                RecordType::NS => RData::NS(name),
                _ => unreachable!(),
            })
        }
        RecordType::MX => {
            if rdlength < 3 {
                return Ok(RData::Raw(buf[offset..offset + rdlength].to_vec()));
            }
            let preference = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let (exchange, _) = parse_name(buf, offset + 2)?;
            Ok(RData::MX {
                preference,
                exchange,
            })
        }
        RecordType::TXT => {
            let mut txt = String::new();
            let mut pos = offset;
            let end = offset + rdlength;
            while pos < end {
                let len = buf[pos] as usize;
                pos += 1;
                if pos + len > end {
                    break;
                }
                if let Ok(s) = std::str::from_utf8(&buf[pos..pos + len]) {
                    txt.push_str(s);
                }
                pos += len;
            }
            Ok(RData::TXT(txt))
        }
        RecordType::SOA => {
            let (mname, next) = parse_name(buf, offset)?;
            let (rname, next) = parse_name(buf, next)?;
            if next + 20 > buf.len() {
                return Ok(RData::Raw(buf[offset..offset + rdlength].to_vec()));
            }
            let o = next;
            Ok(RData::SOA {
                mname,
                rname,
                serial: u32::from_be_bytes([buf[o], buf[o + 1], buf[o + 2], buf[o + 3]]),
                refresh: u32::from_be_bytes([buf[o + 4], buf[o + 5], buf[o + 6], buf[o + 7]]),
                retry: u32::from_be_bytes([buf[o + 8], buf[o + 9], buf[o + 10], buf[o + 11]]),
                expire: u32::from_be_bytes([buf[o + 12], buf[o + 13], buf[o + 14], buf[o + 15]]),
                minimum: u32::from_be_bytes([buf[o + 16], buf[o + 17], buf[o + 18], buf[o + 19]]),
            })
        }
        RecordType::SRV => {
            if rdlength < 7 {
                return Ok(RData::Raw(buf[offset..offset + rdlength].to_vec()));
            }
            let priority = u16::from_be_bytes([buf[offset], buf[offset + 1]]);
            let weight = u16::from_be_bytes([buf[offset + 2], buf[offset + 3]]);
            let port = u16::from_be_bytes([buf[offset + 4], buf[offset + 5]]);
            let (target, _) = parse_name(buf, offset + 6)?;
            Ok(RData::SRV {
                priority,
                weight,
                port,
                target,
            })
        }
        _ => Ok(RData::Raw(buf[offset..offset + rdlength].to_vec())),
    }
}

fn encode_record(record: &DnsRecord, buf: &mut Vec<u8>) {
    encode_name(&record.name, buf);
    buf.extend_from_slice(&record.rtype.to_u16().to_be_bytes());
    buf.extend_from_slice(&record.class.to_u16().to_be_bytes());
    buf.extend_from_slice(&record.ttl.to_be_bytes());
    encode_rdata(&record.rdata, buf);
}

fn encode_rdata(rdata: &RData, buf: &mut Vec<u8>) {
    match rdata {
        RData::A(ip) => {
            buf.extend_from_slice(&4u16.to_be_bytes());
            buf.extend_from_slice(&ip.octets());
        }
        RData::AAAA(ip) => {
            buf.extend_from_slice(&16u16.to_be_bytes());
            buf.extend_from_slice(&ip.octets());
        }
        RData::CNAME(name) | RData::PTR(name) | RData::NS(name) => {
            let mut rdata_buf = Vec::new();
            encode_name(name, &mut rdata_buf);
            buf.extend_from_slice(&(rdata_buf.len() as u16).to_be_bytes());
            buf.extend_from_slice(&rdata_buf);
        }
        RData::MX {
            preference,
            exchange,
        } => {
            let mut rdata_buf = Vec::new();
            rdata_buf.extend_from_slice(&preference.to_be_bytes());
            encode_name(exchange, &mut rdata_buf);
            buf.extend_from_slice(&(rdata_buf.len() as u16).to_be_bytes());
            buf.extend_from_slice(&rdata_buf);
        }
        RData::TXT(text) => {
            let mut rdata_buf = Vec::new();
            let text_bytes = text.as_bytes();
            if text_bytes.is_empty() {
                rdata_buf.push(0);
            }
            for chunk in text_bytes.chunks(255) {
                rdata_buf.push(chunk.len() as u8);
                rdata_buf.extend_from_slice(chunk);
            }
            buf.extend_from_slice(&(rdata_buf.len() as u16).to_be_bytes());
            buf.extend_from_slice(&rdata_buf);
        }
        RData::SOA {
            mname,
            rname,
            serial,
            refresh,
            retry,
            expire,
            minimum,
        } => {
            let mut rdata_buf = Vec::new();
            encode_name(mname, &mut rdata_buf);
            encode_name(rname, &mut rdata_buf);
            rdata_buf.extend_from_slice(&serial.to_be_bytes());
            rdata_buf.extend_from_slice(&refresh.to_be_bytes());
            rdata_buf.extend_from_slice(&retry.to_be_bytes());
            rdata_buf.extend_from_slice(&expire.to_be_bytes());
            rdata_buf.extend_from_slice(&minimum.to_be_bytes());
            buf.extend_from_slice(&(rdata_buf.len() as u16).to_be_bytes());
            buf.extend_from_slice(&rdata_buf);
        }
        RData::SRV {
            priority,
            weight,
            port,
            target,
        } => {
            let mut rdata_buf = Vec::new();
            rdata_buf.extend_from_slice(&priority.to_be_bytes());
            rdata_buf.extend_from_slice(&weight.to_be_bytes());
            rdata_buf.extend_from_slice(&port.to_be_bytes());
            encode_name(target, &mut rdata_buf);
            buf.extend_from_slice(&(rdata_buf.len() as u16).to_be_bytes());
            buf.extend_from_slice(&rdata_buf);
        }
        RData::Raw(data) => {
            buf.extend_from_slice(&(data.len() as u16).to_be_bytes());
            buf.extend_from_slice(data);
        }
    }
}

/// Serialize a single record exactly as it would appear on the wire, with
/// no outside compression pointers — this is the cache's `data` column.
pub fn encode_record_bytes(record: &DnsRecord) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_record(record, &mut buf);
    buf
}

/// The inverse of [`encode_record_bytes`]: decode a single self-contained
/// record. Since the bytes were produced by this codec they never contain
/// compression pointers, but `parse_records` handles that case anyway.
pub fn decode_record_bytes(data: &[u8]) -> Result<DnsRecord, DnsParseError> {
    let mut out = Vec::new();
    parse_records(data, 0, 1, &mut out)?;
    out.into_iter().next().ok_or(DnsParseError::Truncated(0))
}

/// Build a `FormatError` response by patching the 12-byte header in place,
/// for input too malformed to even reach `Message::parse` cleanly (e.g. a
/// truncated header). Returns an empty vector if even the header is
/// unreadable — the listener drops those silently.
pub fn format_error_echo(buf: &[u8]) -> Vec<u8> {
    if buf.len() < 12 {
        return Vec::new();
    }
    let mut resp = buf[..12].to_vec();
    resp[2] |= 0x80; // QR = 1
    resp[3] = (resp[3] & 0xF0) | (RCODE_FORMERR & 0xF); // RCODE = FormatError
    for byte in resp.iter_mut().take(12).skip(4) {
        *byte = 0; // no sections follow
    }
    resp
}

/// Truncate a serialized response to fit a UDP datagram, setting TC=1 first.
/// Per RFC 1035: a client seeing TC=1 discards the partial answer and
/// retries over TCP, so the truncated bytes never need to be a valid
/// record boundary.
pub fn truncate_for_udp(serialized: &[u8], max_size: usize) -> Result<Vec<u8>, DnsParseError> {
    if serialized.len() <= max_size {
        return Ok(serialized.to_vec());
    }
    let (message, _) = Message::parse(serialized)?;
    let truncated = Message {
        header: message.header.with_tc(true),
        ..message
    };
    let mut bytes = truncated.serialize();
    bytes.truncate(max_size);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_name_round_trips() {
        let mut buf = Vec::new();
        encode_name("www.example.com.", &mut buf);
        assert_eq!(buf, b"\x03www\x07example\x03com\x00");

        let (name, end) = parse_name(&buf, 0).unwrap();
        assert_eq!(name, "www.example.com.");
        assert_eq!(end, buf.len());
    }

    #[test]
    fn encode_root_is_single_zero_byte() {
        let mut buf = Vec::new();
        encode_name(".", &mut buf);
        assert_eq!(buf, b"\x00");

        let (name, _) = parse_name(&buf, 0).unwrap();
        assert_eq!(name, ".");
    }

    #[test]
    fn parse_name_follows_compression_pointer() {
        // Packet with "www.example.com" at offset 12, then a pointer to it.
        let mut buf = vec![0u8; 12];
        buf.extend_from_slice(b"\x03www\x07example\x03com\x00");
        let ptr_offset = buf.len();
        buf.push(0xc0);
        buf.push(0x0c);

        let (name, end) = parse_name(&buf, ptr_offset).unwrap();
        assert_eq!(name, "www.example.com.");
        assert_eq!(end, ptr_offset + 2);
    }

    #[test]
    fn testable_property_pointer_example() {
        let mut buf = vec![0u8; 12];
        buf.extend_from_slice(&[
            0x03, 0x77, 0x77, 0x77, 0x07, 0x65, 0x78, 0x61, 0x6d, 0x70, 0x6c, 0x65, 0x03, 0x63,
            0x6f, 0x6d, 0x00,
        ]);
        let ptr_at = buf.len();
        buf.push(0xc0);
        buf.push(0x0c);
        let (name, _) = parse_name(&buf, ptr_at).unwrap();
        assert_eq!(name, "www.example.com.");
    }

    #[test]
    fn pointer_self_loop_is_malformed() {
        let mut buf = vec![0u8; 12];
        // Pointer at offset 12 pointing to itself.
        buf.extend_from_slice(&[0xc0, 0x0c]);
        let err = parse_name(&buf, 12).unwrap_err();
        assert_eq!(err, DnsParseError::CompressionLoop);
    }

    #[test]
    fn pointer_chain_over_128_fails() {
        // A chain of 130 two-byte pointers, each pointing to the next,
        // terminated by a zero-length root name.
        let mut buf = Vec::new();
        let chain_len = 130usize;
        for i in 0..chain_len {
            let next = (i + 1) * 2;
            buf.push(0xc0 | ((next >> 8) as u8));
            buf.push((next & 0xff) as u8);
        }
        buf.push(0x00);
        let err = parse_name(&buf, 0).unwrap_err();
        assert_eq!(err, DnsParseError::CompressionLoop);
    }

    #[test]
    fn header_flag_mutation_returns_new_value() {
        let h = Header {
            id: 1,
            flags: 0,
            qd_count: 0,
            an_count: 0,
            ns_count: 0,
            ar_count: 0,
        };
        let h2 = h.with_qr(true).with_rcode(4);
        assert!(!h.is_response());
        assert!(h2.is_response());
        assert_eq!(h2.rcode(), 4);
    }

    #[test]
    fn message_round_trips_through_serialize_and_parse() {
        let mut query_buf = Vec::new();
        query_buf.extend_from_slice(&[
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
        encode_name("example.com.", &mut query_buf);
        query_buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);

        let (query, _) = Message::parse(&query_buf).unwrap();
        assert_eq!(query.header.id, 0x1234);
        assert!(query.header.recursion_desired());
        assert_eq!(query.questions.len(), 1);
        assert_eq!(query.questions[0].name, "example.com.");
        assert_eq!(query.questions[0].qtype, RecordType::A);

        let answers = vec![DnsRecord::a("example.com.", Ipv4Addr::new(93, 184, 216, 34), 300)];
        let response = query.with_answers(answers);
        let bytes = response.serialize();

        let (parsed, _) = Message::parse(&bytes).unwrap();
        assert!(parsed.header.is_response());
        assert_eq!(parsed.header.rcode(), RCODE_NOERROR);
        assert_eq!(parsed.answers.len(), 1);
        assert_eq!(parsed.answers[0].name, "example.com.");
        match &parsed.answers[0].rdata {
            RData::A(ip) => assert_eq!(*ip, Ipv4Addr::new(93, 184, 216, 34)),
            other => panic!("expected A record, got {:?}", other),
        }
    }

    #[test]
    fn ns_rdata_is_stored_decompressed() {
        // Header: id=1, flags=QR, qd=0, an=0, ns=1, ar=0.
        let mut buf = vec![0x00, 0x01, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00];

        // A literal name at offset 12 that both the record's owner name and
        // its rdata will point back into.
        let name_offset = buf.len();
        encode_name("example.com.", &mut buf);

        // Authority record: name = pointer to name_offset, type=NS, class=IN,
        // ttl=3600, rdlength=2, rdata = pointer to name_offset.
        buf.push(0xc0 | ((name_offset >> 8) as u8));
        buf.push((name_offset & 0xff) as u8);
        buf.extend_from_slice(&[0x00, 0x02, 0x00, 0x01]); // NS, IN
        buf.extend_from_slice(&3600u32.to_be_bytes());
        buf.extend_from_slice(&2u16.to_be_bytes());
        buf.push(0xc0 | ((name_offset >> 8) as u8));
        buf.push((name_offset & 0xff) as u8);

        let (parsed, _) = Message::parse(&buf).unwrap();
        assert_eq!(parsed.authorities.len(), 1);
        assert_eq!(parsed.authorities[0].name, "example.com.");
        match &parsed.authorities[0].rdata {
            RData::NS(name) => assert_eq!(name, "example.com."),
            other => panic!("expected NS record, got {:?}", other),
        }
    }

    #[test]
    fn truncate_for_udp_sets_tc_and_caps_length() {
        let mut query_buf = Vec::new();
        query_buf.extend_from_slice(&[
            0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
        ]);
        encode_name("example.com.", &mut query_buf);
        query_buf.extend_from_slice(&[0x00, 0x01, 0x00, 0x01]);
        let (query, _) = Message::parse(&query_buf).unwrap();

        let mut answers = Vec::new();
        for i in 0..60 {
            answers.push(DnsRecord::a(
                &format!("n{}.example.com.", i),
                Ipv4Addr::new(1, 2, 3, i as u8),
                300,
            ));
        }
        let response = query.with_answers(answers).serialize();
        assert!(response.len() > 512);

        let truncated = truncate_for_udp(&response, 512).unwrap();
        assert_eq!(truncated.len(), 512);
        assert_eq!(truncated[2] & 0x02, 0x02);
    }

    #[test]
    fn format_error_echo_sets_qr_and_rcode() {
        let buf = vec![0x12, 0x34, 0x01, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00];
        let resp = format_error_echo(&buf);
        assert_eq!(resp.len(), 12);
        assert_eq!(u16::from_be_bytes([resp[0], resp[1]]), 0x1234);
        assert_eq!(resp[2] & 0x80, 0x80);
        assert_eq!(resp[3] & 0x0F, RCODE_FORMERR);
    }
}
