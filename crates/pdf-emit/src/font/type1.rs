//! Type 1 font program unpacking (PFB and PFA)
//!
//! PDF wants the cleartext header, the binary eexec section and the trailer
//! back to back, with the length of each in `/Length1`, `/Length2` and
//! `/Length3`.

/// A font program ready for `/FontFile`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Type1Program {
    pub data: Vec<u8>,
    pub header_len: usize,
    pub data_len: usize,
    pub trailer_len: usize,
}

const PFB_SECTION_HEADER: usize = 6;
const PFA_TRAILER_ZEROS: usize = 512;

/// Unpack a PFB or PFA font program
pub fn parse_type1(src: &[u8]) -> Option<Type1Program> {
    parse_pfb(src).or_else(|| parse_pfa(src))
}

/// Read one PFB segment: `0x80`, type, little-endian length, payload
fn pfb_section<'a>(src: &mut &'a [u8], section_type: u8) -> Option<&'a [u8]> {
    if src.len() < 2 || src[0] != 0x80 || src[1] != section_type {
        return None;
    }
    if section_type == 3 {
        return Some(&[]);
    }
    if src.len() < PFB_SECTION_HEADER {
        return None;
    }
    let len = u32::from_le_bytes([src[2], src[3], src[4], src[5]]) as usize;
    let end = PFB_SECTION_HEADER.checked_add(len)?;
    let payload = src.get(PFB_SECTION_HEADER..end)?;
    *src = &src[end..];
    Some(payload)
}

fn parse_pfb(src: &[u8]) -> Option<Type1Program> {
    let mut rest = src;
    let header = pfb_section(&mut rest, 1)?;
    let data = pfb_section(&mut rest, 2)?;
    let trailer = pfb_section(&mut rest, 1)?;
    pfb_section(&mut rest, 3)?;

    let mut program = Vec::with_capacity(header.len() + data.len() + trailer.len());
    program.extend_from_slice(header);
    program.extend_from_slice(data);
    program.extend_from_slice(trailer);
    Some(Type1Program {
        data: program,
        header_len: header.len(),
        data_len: data.len(),
        trailer_len: trailer.len(),
    })
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn is_space(b: u8) -> bool {
    matches!(b, b'\n' | b'\r' | b' ')
}

/// The binary section of a PFA follows the `eexec` line as hex; the trailer
/// is 512 zeros followed by `cleartomark`
fn parse_pfa(src: &[u8]) -> Option<Type1Program> {
    let mut data_start = find(src, b"eexec")? + b"eexec".len();
    while data_start < src.len() && is_space(src[data_start]) {
        data_start += 1;
    }

    let mark = data_start + find(&src[data_start..], b"cleartomark")?;
    let mut trailer_start = mark;
    let mut zeros = 0;
    while trailer_start > data_start && zeros < PFA_TRAILER_ZEROS {
        trailer_start -= 1;
        match src[trailer_start] {
            b'0' => zeros += 1,
            b if is_space(b) => {}
            _ => return None,
        }
    }
    if zeros != PFA_TRAILER_ZEROS {
        return None;
    }

    let hex = &src[data_start..trailer_start];
    if !hex
        .iter()
        .all(|b| b.is_ascii_hexdigit() || b.is_ascii_whitespace())
    {
        return None;
    }
    let nibbles: Vec<u8> = hex
        .iter()
        .filter_map(|&b| (b as char).to_digit(16).map(|d| d as u8))
        .collect();
    let binary: Vec<u8> = nibbles
        .chunks(2)
        .map(|pair| match pair {
            [hi, lo] => *hi << 4 | *lo,
            [hi] => *hi << 4,
            _ => 0,
        })
        .collect();

    let header = &src[..data_start];
    let trailer = &src[trailer_start..];
    let mut program = Vec::with_capacity(header.len() + binary.len() + trailer.len());
    program.extend_from_slice(header);
    program.extend_from_slice(&binary);
    program.extend_from_slice(trailer);
    Some(Type1Program {
        data: program,
        header_len: header.len(),
        data_len: binary.len(),
        trailer_len: trailer.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn segment(kind: u8, payload: &[u8]) -> Vec<u8> {
        let mut out = vec![0x80, kind];
        out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
        out.extend_from_slice(payload);
        out
    }

    fn trailer() -> Vec<u8> {
        let mut trailer = Vec::new();
        for _ in 0..8 {
            trailer.extend_from_slice(&[b'0'; 64]);
            trailer.push(b'\n');
        }
        trailer.extend_from_slice(b"cleartomark\n");
        trailer
    }

    #[test]
    fn test_pfb_sections_are_concatenated() {
        let mut pfb = segment(1, b"%!FontType1 header eexec\n");
        pfb.extend(segment(2, &[0xDE, 0xAD, 0xBE, 0xEF, 0x01]));
        pfb.extend(segment(1, b"0000 cleartomark"));
        pfb.extend_from_slice(&[0x80, 3]);

        let program = parse_type1(&pfb).unwrap();
        assert_eq!(program.header_len, 25);
        assert_eq!(program.data_len, 5);
        assert_eq!(program.trailer_len, 16);
        assert_eq!(&program.data[25..30], &[0xDE, 0xAD, 0xBE, 0xEF, 0x01]);
        assert_eq!(&program.data[30..], b"0000 cleartomark");
    }

    #[test]
    fn test_truncated_pfb_is_rejected() {
        let mut pfb = segment(1, b"header");
        pfb.extend(segment(2, &[1, 2, 3]));
        pfb.truncate(pfb.len() - 1);
        assert!(parse_pfb(&pfb).is_none());
    }

    #[test]
    fn test_pfa_hex_is_decoded() {
        let mut pfa = b"%!PS-AdobeFont-1.0 currentfile eexec\r\n".to_vec();
        let header_len = pfa.len();
        pfa.extend_from_slice(b"DEADBEEF\n0a1\n");
        let trailer = trailer();
        pfa.extend_from_slice(&trailer);

        let program = parse_type1(&pfa).unwrap();
        assert_eq!(program.header_len, header_len);
        assert_eq!(program.data_len, 6);
        assert_eq!(
            &program.data[header_len..header_len + 6],
            &[0xDE, 0xAD, 0xBE, 0xEF, 0x0A, 0x10]
        );
        assert_eq!(program.trailer_len, trailer.len());
        assert!(program.data.ends_with(b"cleartomark\n"));
    }

    #[test]
    fn test_pfa_without_zeros_is_rejected() {
        let pfa = b"eexec\nDEADBEEF\n0000 cleartomark".to_vec();
        assert!(parse_type1(&pfa).is_none());
    }
}
