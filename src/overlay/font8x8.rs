//! Built-in 8x8 bitmap font (printable ASCII)
//!
//! Rows are bytes, bit 0 is the leftmost pixel. Used whenever no TrueType
//! face could be loaded.

pub const CHAR_WIDTH: u32 = 8;
pub const CHAR_HEIGHT: u32 = 8;

/// Glyph bitmap for an ASCII character; non-ASCII falls back to '?'
pub fn glyph(ch: char) -> &'static [u8; 8] {
    let idx = ch as usize;
    if idx < 128 {
        &FONT8X8_BASIC[idx]
    } else {
        &FONT8X8_BASIC[b'?' as usize]
    }
}

#[rustfmt::skip]
static FONT8X8_BASIC: [[u8; 8]; 128] = {
    let mut font = [[0u8; 8]; 128];
    font[0x21] = [0x18, 0x3C, 0x3C, 0x18, 0x18, 0x00, 0x18, 0x00]; // !
    font[0x22] = [0x36, 0x36, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]; // "
    font[0x23] = [0x36, 0x36, 0x7F, 0x36, 0x7F, 0x36, 0x36, 0x00]; // #
    font[0x24] = [0x0C, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x0C, 0x00]; // $
    font[0x25] = [0x00, 0x63, 0x33, 0x18, 0x0C, 0x66, 0x63, 0x00]; // %
    font[0x26] = [0x1C, 0x36, 0x1C, 0x6E, 0x3B, 0x33, 0x6E, 0x00]; // &
    font[0x27] = [0x06, 0x06, 0x03, 0x00, 0x00, 0x00, 0x00, 0x00]; // '
    font[0x28] = [0x18, 0x0C, 0x06, 0x06, 0x06, 0x0C, 0x18, 0x00]; // (
    font[0x29] = [0x06, 0x0C, 0x18, 0x18, 0x18, 0x0C, 0x06, 0x00]; // )
    font[0x2A] = [0x00, 0x66, 0x3C, 0xFF, 0x3C, 0x66, 0x00, 0x00]; // *
    font[0x2B] = [0x00, 0x0C, 0x0C, 0x3F, 0x0C, 0x0C, 0x00, 0x00]; // +
    font[0x2C] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x06]; // ,
    font[0x2D] = [0x00, 0x00, 0x00, 0x3F, 0x00, 0x00, 0x00, 0x00]; // -
    font[0x2E] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x0C, 0x0C, 0x00]; // .
    font[0x2F] = [0x60, 0x30, 0x18, 0x0C, 0x06, 0x03, 0x01, 0x00]; // /
    font[0x30] = [0x3E, 0x63, 0x73, 0x7B, 0x6F, 0x67, 0x3E, 0x00]; // 0
    font[0x31] = [0x0C, 0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x3F, 0x00]; // 1
    font[0x32] = [0x1E, 0x33, 0x30, 0x1C, 0x06, 0x33, 0x3F, 0x00]; // 2
    font[0x33] = [0x1E, 0x33, 0x30, 0x1C, 0x30, 0x33, 0x1E, 0x00]; // 3
    font[0x34] = [0x38, 0x3C, 0x36, 0x33, 0x7F, 0x30, 0x78, 0x00]; // 4
    font[0x35] = [0x3F, 0x03, 0x1F, 0x30, 0x30, 0x33, 0x1E, 0x00]; // 5
    font[0x36] = [0x1C, 0x06, 0x03, 0x1F, 0x33, 0x33, 0x1E, 0x00]; // 6
    font[0x37] = [0x3F, 0x33, 0x30, 0x18, 0x0C, 0x0C, 0x0C, 0x00]; // 7
    font[0x38] = [0x1E, 0x33, 0x33, 0x1E, 0x33, 0x33, 0x1E, 0x00]; // 8
    font[0x39] = [0x1E, 0x33, 0x33, 0x3E, 0x30, 0x18, 0x0E, 0x00]; // 9
    font[0x3A] = [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x00]; // :
    font[0x3B] = [0x00, 0x0C, 0x0C, 0x00, 0x00, 0x0C, 0x0C, 0x06]; // ;
    font[0x3C] = [0x18, 0x0C, 0x06, 0x03, 0x06, 0x0C, 0x18, 0x00]; // <
    font[0x3D] = [0x00, 0x00, 0x3F, 0x00, 0x00, 0x3F, 0x00, 0x00]; // =
    font[0x3E] = [0x06, 0x0C, 0x18, 0x30, 0x18, 0x0C, 0x06, 0x00]; // >
    font[0x3F] = [0x1E, 0x33, 0x30, 0x18, 0x0C, 0x00, 0x0C, 0x00]; // ?
    font[0x40] = [0x3E, 0x63, 0x7B, 0x7B, 0x7B, 0x03, 0x1E, 0x00]; // @
    font[0x41] = [0x0C, 0x1E, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x00]; // A
    font[0x42] = [0x3F, 0x66, 0x66, 0x3E, 0x66, 0x66, 0x3F, 0x00]; // B
    font[0x43] = [0x3C, 0x66, 0x03, 0x03, 0x03, 0x66, 0x3C, 0x00]; // C
    font[0x44] = [0x1F, 0x36, 0x66, 0x66, 0x66, 0x36, 0x1F, 0x00]; // D
    font[0x45] = [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x46, 0x7F, 0x00]; // E
    font[0x46] = [0x7F, 0x46, 0x16, 0x1E, 0x16, 0x06, 0x0F, 0x00]; // F
    font[0x47] = [0x3C, 0x66, 0x03, 0x03, 0x73, 0x66, 0x7C, 0x00]; // G
    font[0x48] = [0x33, 0x33, 0x33, 0x3F, 0x33, 0x33, 0x33, 0x00]; // H
    font[0x49] = [0x1E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00]; // I
    font[0x4A] = [0x78, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E, 0x00]; // J
    font[0x4B] = [0x67, 0x66, 0x36, 0x1E, 0x36, 0x66, 0x67, 0x00]; // K
    font[0x4C] = [0x0F, 0x06, 0x06, 0x06, 0x46, 0x66, 0x7F, 0x00]; // L
    font[0x4D] = [0x63, 0x77, 0x7F, 0x7F, 0x6B, 0x63, 0x63, 0x00]; // M
    font[0x4E] = [0x63, 0x67, 0x6F, 0x7B, 0x73, 0x63, 0x63, 0x00]; // N
    font[0x4F] = [0x1C, 0x36, 0x63, 0x63, 0x63, 0x36, 0x1C, 0x00]; // O
    font[0x50] = [0x3F, 0x66, 0x66, 0x3E, 0x06, 0x06, 0x0F, 0x00]; // P
    font[0x51] = [0x1E, 0x33, 0x33, 0x33, 0x3B, 0x1E, 0x38, 0x00]; // Q
    font[0x52] = [0x3F, 0x66, 0x66, 0x3E, 0x36, 0x66, 0x67, 0x00]; // R
    font[0x53] = [0x1E, 0x33, 0x07, 0x0E, 0x38, 0x33, 0x1E, 0x00]; // S
    font[0x54] = [0x3F, 0x2D, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00]; // T
    font[0x55] = [0x33, 0x33, 0x33, 0x33, 0x33, 0x33, 0x3F, 0x00]; // U
    font[0x56] = [0x33, 0x33, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00]; // V
    font[0x57] = [0x63, 0x63, 0x63, 0x6B, 0x7F, 0x77, 0x63, 0x00]; // W
    font[0x58] = [0x63, 0x63, 0x36, 0x1C, 0x1C, 0x36, 0x63, 0x00]; // X
    font[0x59] = [0x33, 0x33, 0x33, 0x1E, 0x0C, 0x0C, 0x1E, 0x00]; // Y
    font[0x5A] = [0x7F, 0x63, 0x31, 0x18, 0x4C, 0x66, 0x7F, 0x00]; // Z
    font[0x5B] = [0x1E, 0x06, 0x06, 0x06, 0x06, 0x06, 0x1E, 0x00]; // [
    font[0x5C] = [0x03, 0x06, 0x0C, 0x18, 0x30, 0x60, 0x40, 0x00]; // backslash
    font[0x5D] = [0x1E, 0x18, 0x18, 0x18, 0x18, 0x18, 0x1E, 0x00]; // ]
    font[0x5E] = [0x08, 0x1C, 0x36, 0x63, 0x00, 0x00, 0x00, 0x00]; // ^
    font[0x5F] = [0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0xFF]; // _
    font[0x60] = [0x0C, 0x0C, 0x18, 0x00, 0x00, 0x00, 0x00, 0x00]; // `
    font[0x61] = [0x00, 0x00, 0x1E, 0x30, 0x3E, 0x33, 0x6E, 0x00]; // a
    font[0x62] = [0x07, 0x06, 0x06, 0x3E, 0x66, 0x66, 0x3B, 0x00]; // b
    font[0x63] = [0x00, 0x00, 0x1E, 0x33, 0x03, 0x33, 0x1E, 0x00]; // c
    font[0x64] = [0x38, 0x30, 0x30, 0x3E, 0x33, 0x33, 0x6E, 0x00]; // d
    font[0x65] = [0x00, 0x00, 0x1E, 0x33, 0x3F, 0x03, 0x1E, 0x00]; // e
    font[0x66] = [0x1C, 0x36, 0x06, 0x0F, 0x06, 0x06, 0x0F, 0x00]; // f
    font[0x67] = [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x1F]; // g
    font[0x68] = [0x07, 0x06, 0x36, 0x6E, 0x66, 0x66, 0x67, 0x00]; // h
    font[0x69] = [0x0C, 0x00, 0x0E, 0x0C, 0x0C, 0x0C, 0x1E, 0x00]; // i
    font[0x6A] = [0x30, 0x00, 0x30, 0x30, 0x30, 0x33, 0x33, 0x1E]; // j
    font[0x6B] = [0x07, 0x06, 0x66, 0x36, 0x1E, 0x36, 0x67, 0x00]; // k
    font[0x6C] = [0x0E, 0x0C, 0x0C, 0x0C, 0x0C, 0x0C, 0x1E, 0x00]; // l
    font[0x6D] = [0x00, 0x00, 0x33, 0x7F, 0x7F, 0x6B, 0x63, 0x00]; // m
    font[0x6E] = [0x00, 0x00, 0x1F, 0x33, 0x33, 0x33, 0x33, 0x00]; // n
    font[0x6F] = [0x00, 0x00, 0x1E, 0x33, 0x33, 0x33, 0x1E, 0x00]; // o
    font[0x70] = [0x00, 0x00, 0x3B, 0x66, 0x66, 0x3E, 0x06, 0x0F]; // p
    font[0x71] = [0x00, 0x00, 0x6E, 0x33, 0x33, 0x3E, 0x30, 0x78]; // q
    font[0x72] = [0x00, 0x00, 0x3B, 0x6E, 0x66, 0x06, 0x0F, 0x00]; // r
    font[0x73] = [0x00, 0x00, 0x3E, 0x03, 0x1E, 0x30, 0x1F, 0x00]; // s
    font[0x74] = [0x08, 0x0C, 0x3E, 0x0C, 0x0C, 0x2C, 0x18, 0x00]; // t
    font[0x75] = [0x00, 0x00, 0x33, 0x33, 0x33, 0x33, 0x6E, 0x00]; // u
    font[0x76] = [0x00, 0x00, 0x33, 0x33, 0x33, 0x1E, 0x0C, 0x00]; // v
    font[0x77] = [0x00, 0x00, 0x63, 0x6B, 0x7F, 0x7F, 0x36, 0x00]; // w
    font[0x78] = [0x00, 0x00, 0x63, 0x36, 0x1C, 0x36, 0x63, 0x00]; // x
    font[0x79] = [0x00, 0x00, 0x33, 0x33, 0x33, 0x3E, 0x30, 0x1F]; // y
    font[0x7A] = [0x00, 0x00, 0x3F, 0x19, 0x0C, 0x26, 0x3F, 0x00]; // z
    font[0x7B] = [0x38, 0x0C, 0x0C, 0x07, 0x0C, 0x0C, 0x38, 0x00]; // {
    font[0x7C] = [0x18, 0x18, 0x18, 0x00, 0x18, 0x18, 0x18, 0x00]; // |
    font[0x7D] = [0x07, 0x0C, 0x0C, 0x38, 0x0C, 0x0C, 0x07, 0x00]; // }
    font[0x7E] = [0x6E, 0x3B, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00]; // ~
    font
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_space_is_blank() {
        assert_eq!(glyph(' '), &[0u8; 8]);
    }

    #[test]
    fn test_printable_glyphs_have_ink() {
        for code in 0x21u8..0x7F {
            let g = glyph(code as char);
            assert!(
                g.iter().any(|row| *row != 0),
                "glyph {:#x} is blank",
                code
            );
        }
    }

    #[test]
    fn test_non_ascii_falls_back() {
        assert_eq!(glyph('\u{4e2d}'), glyph('?'));
    }
}
