//! OSC 1.0 message encoding.
//!
//! Only plain messages are supported (no bundles). Strings are
//! NUL-terminated and padded to a multiple of four bytes, numbers are
//! big-endian.

use super::OscError;

/// A single OSC argument.
#[derive(Debug, Clone, PartialEq)]
pub enum OscArg {
    Int(i32),
    Float(f32),
    Str(String),
}

impl OscArg {
    const fn tag(&self) -> u8 {
        match self {
            Self::Int(_) => b'i',
            Self::Float(_) => b'f',
            Self::Str(_) => b's',
        }
    }
}

/// An OSC message: address pattern plus arguments.
#[derive(Debug, Clone, PartialEq)]
pub struct OscMessage {
    pub address: String,
    pub args: Vec<OscArg>,
}

impl OscMessage {
    pub fn new(address: impl Into<String>, args: Vec<OscArg>) -> Self {
        Self {
            address: address.into(),
            args,
        }
    }

    /// Encode into a packet.
    ///
    /// # Errors
    /// Returns [`OscError::InvalidAddress`] if the address does not start
    /// with `/`, and [`OscError::InteriorNul`] if any string contains a NUL
    /// byte, which would truncate it on the receiving side.
    pub fn encode(&self) -> Result<Vec<u8>, OscError> {
        if !self.address.starts_with('/') {
            return Err(OscError::InvalidAddress(self.address.clone()));
        }
        let mut buf = Vec::with_capacity(padded_len(self.address.len()) + 8);
        write_str(&mut buf, &self.address)?;

        let mut tags = String::with_capacity(self.args.len() + 1);
        tags.push(',');
        tags.extend(self.args.iter().map(|arg| char::from(arg.tag())));
        write_str(&mut buf, &tags)?;

        for arg in &self.args {
            match arg {
                OscArg::Int(v) => buf.extend_from_slice(&v.to_be_bytes()),
                OscArg::Float(v) => buf.extend_from_slice(&v.to_be_bytes()),
                OscArg::Str(s) => write_str(&mut buf, s)?,
            }
        }
        Ok(buf)
    }

    /// Decode a packet produced by [`OscMessage::encode`] or by sclang.
    ///
    /// # Errors
    /// Returns [`OscError::Malformed`] if the packet is truncated, not
    /// 4-byte aligned, or uses an unsupported type tag.
    pub fn decode(packet: &[u8]) -> Result<Self, OscError> {
        let mut reader = Reader { buf: packet, pos: 0 };
        let address = reader.string()?;
        if !address.starts_with('/') {
            return Err(OscError::Malformed(format!("bad address {address:?}")));
        }
        let tags = reader.string()?;
        let Some(tags) = tags.strip_prefix(',') else {
            return Err(OscError::Malformed("missing type tag string".to_string()));
        };

        let mut args = Vec::with_capacity(tags.len());
        for tag in tags.bytes() {
            let arg = match tag {
                b'i' => OscArg::Int(i32::from_be_bytes(reader.word()?)),
                b'f' => OscArg::Float(f32::from_be_bytes(reader.word()?)),
                b's' => OscArg::Str(reader.string()?),
                other => {
                    return Err(OscError::Malformed(format!(
                        "unsupported type tag {:?}",
                        char::from(other)
                    )));
                }
            };
            args.push(arg);
        }
        if reader.pos != packet.len() {
            return Err(OscError::Malformed("trailing bytes".to_string()));
        }
        Ok(Self { address, args })
    }
}

const fn padded_len(len: usize) -> usize {
    // Always at least one NUL.
    (len / 4 + 1) * 4
}

fn write_str(buf: &mut Vec<u8>, s: &str) -> Result<(), OscError> {
    if s.as_bytes().contains(&0) {
        return Err(OscError::InteriorNul);
    }
    buf.extend_from_slice(s.as_bytes());
    buf.resize(buf.len() + padded_len(s.len()) - s.len(), 0);
    Ok(())
}

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl Reader<'_> {
    fn word(&mut self) -> Result<[u8; 4], OscError> {
        let bytes = self
            .buf
            .get(self.pos..self.pos + 4)
            .ok_or_else(|| OscError::Malformed("truncated argument".to_string()))?;
        self.pos += 4;
        let mut word = [0u8; 4];
        word.copy_from_slice(bytes);
        Ok(word)
    }

    fn string(&mut self) -> Result<String, OscError> {
        let rest = self.buf.get(self.pos..).unwrap_or_default();
        let nul = rest
            .iter()
            .position(|&b| b == 0)
            .ok_or_else(|| OscError::Malformed("unterminated string".to_string()))?;
        let end = self.pos + padded_len(nul);
        if end > self.buf.len() {
            return Err(OscError::Malformed("string padding truncated".to_string()));
        }
        let s = std::str::from_utf8(&rest[..nul])
            .map_err(|err| OscError::Malformed(format!("string is not UTF-8: {err}")))?
            .to_string();
        self.pos = end;
        Ok(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpret_message_layout() {
        let msg = OscMessage::new("/interpret", vec![OscArg::Str("1+1".to_string())]);
        let packet = msg.encode().unwrap();
        let mut expected = b"/interpret\0\0".to_vec();
        expected.extend_from_slice(b",s\0\0");
        expected.extend_from_slice(b"1+1\0");
        assert_eq!(packet, expected);
    }

    #[test]
    fn test_string_of_multiple_of_four_gets_full_pad() {
        let msg = OscMessage::new("/cmd", vec![]);
        let packet = msg.encode().unwrap();
        assert_eq!(packet, b"/cmd\0\0\0\0,\0\0\0".to_vec());
    }

    #[test]
    fn test_numeric_args_are_big_endian() {
        let msg = OscMessage::new("/n", vec![OscArg::Int(1), OscArg::Float(1.0)]);
        let packet = msg.encode().unwrap();
        assert_eq!(&packet[4..8], b",if\0");
        assert_eq!(&packet[8..12], &[0, 0, 0, 1]);
        assert_eq!(&packet[12..16], &[0x3f, 0x80, 0, 0]);
    }

    #[test]
    fn test_decode_reads_back_mixed_args() {
        let msg = OscMessage::new(
            "/done",
            vec![
                OscArg::Str("/quit".to_string()),
                OscArg::Int(-3),
                OscArg::Float(0.5),
            ],
        );
        let decoded = OscMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded, msg);
    }

    #[test]
    fn test_code_is_sent_verbatim() {
        let code = "(\n\t\"quotes\" ++ 'sym' ++ $\\\\ ++ \"ü\"\n)";
        let msg = OscMessage::new("/interpret", vec![OscArg::Str(code.to_string())]);
        let decoded = OscMessage::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.args, vec![OscArg::Str(code.to_string())]);
    }

    #[test]
    fn test_interior_nul_is_rejected() {
        let msg = OscMessage::new("/interpret", vec![OscArg::Str("a\0b".to_string())]);
        assert!(matches!(msg.encode(), Err(OscError::InteriorNul)));
    }

    #[test]
    fn test_address_must_start_with_slash() {
        let msg = OscMessage::new("interpret", vec![]);
        assert!(matches!(msg.encode(), Err(OscError::InvalidAddress(_))));
    }

    #[test]
    fn test_decode_rejects_truncated_packets() {
        let packet = OscMessage::new("/n", vec![OscArg::Int(7)]).encode().unwrap();
        for cut in [3, 6, packet.len() - 1] {
            assert!(
                matches!(OscMessage::decode(&packet[..cut]), Err(OscError::Malformed(_))),
                "cut at {cut}"
            );
        }
    }

    #[test]
    fn test_decode_rejects_unknown_tag() {
        let packet = b"/x\0\0,b\0\0\0\0\0\0".to_vec();
        assert!(matches!(OscMessage::decode(&packet), Err(OscError::Malformed(_))));
    }
}
