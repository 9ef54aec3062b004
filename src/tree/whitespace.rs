//! Compressed whitespace text
//!
//! Whitespace-only text between elements is very common and very
//! repetitive. Such a text node is stored without touching the character
//! buffer: its content is packed into 64 bits, split across the node's
//! `alpha` (high word) and `beta` (low word).
//!
//! Each byte, from the most significant, is one run:
//!
//! ```text
//! bit 7..6   character: 0 = '\n', 1 = '\t', 2 = ' ', 3 = '\r'
//! bit 5..0   run length (1..=63); a zero byte ends the value
//! ```

const CODES: [char; 4] = ['\n', '\t', ' ', '\r'];
const MAX_RUN: u32 = 63;
const MAX_RUNS: usize = 8;

fn code_of(c: char) -> Option<u64> {
    CODES.iter().position(|&w| w == c).map(|p| p as u64)
}

/// Pack whitespace-only text, or return None if it does not fit
pub fn compress(text: &str) -> Option<u64> {
    if text.is_empty() {
        return None;
    }
    let mut runs: Vec<(u64, u32)> = Vec::with_capacity(MAX_RUNS);
    for c in text.chars() {
        let code = code_of(c)?;
        match runs.last_mut() {
            Some((last, len)) if *last == code && *len < MAX_RUN => *len += 1,
            _ => {
                if runs.len() == MAX_RUNS {
                    return None;
                }
                runs.push((code, 1));
            }
        }
    }
    let mut value = 0u64;
    for (i, (code, len)) in runs.iter().enumerate() {
        let byte = (code << 6) | u64::from(*len);
        value |= byte << (56 - 8 * i);
    }
    Some(value)
}

/// Append the text held in a packed value
pub fn expand_into(value: u64, out: &mut String) {
    for i in 0..MAX_RUNS {
        let byte = (value >> (56 - 8 * i)) & 0xFF;
        if byte == 0 {
            break;
        }
        let c = CODES[(byte >> 6) as usize];
        out.extend(std::iter::repeat_n(c, (byte & 0x3F) as usize));
    }
}

/// Expand a packed value into a new string
pub fn expand(value: u64) -> String {
    let mut out = String::with_capacity(length(value));
    expand_into(value, &mut out);
    out
}

/// Length in bytes of the packed text
pub fn length(value: u64) -> usize {
    (0..MAX_RUNS)
        .map(|i| (value >> (56 - 8 * i)) & 0xFF)
        .take_while(|&b| b != 0)
        .map(|b| (b & 0x3F) as usize)
        .sum()
}

/// Split a packed value into (alpha, beta) words
#[inline]
pub fn split(value: u64) -> (u32, u32) {
    ((value >> 32) as u32, value as u32)
}

/// Rejoin (alpha, beta) words
#[inline]
pub fn join(alpha: u32, beta: u32) -> u64 {
    (u64::from(alpha) << 32) | u64::from(beta)
}
