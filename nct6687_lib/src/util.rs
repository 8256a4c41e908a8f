//! Miscellaneous utility functions to use across modules

/// Print a byte buffer as a hex dump, 16 bytes per line, prefixed by the offset
pub fn print_multiline_buffer(buffer: &[u8], offset: usize) {
    for line in format_multiline_buffer(buffer, offset) {
        println!("{}", line);
    }
}

fn format_multiline_buffer(buffer: &[u8], offset: usize) -> Vec<String> {
    buffer
        .chunks(16)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes: Vec<String> = chunk.iter().map(|b| format!("{:02X}", b)).collect();
            format!("{:04X}: {}", offset + i * 16, bytes.join(" "))
        })
        .collect()
}

/// Format a value in thousandths with three decimals, e.g. 25500 as "25.500"
pub fn format_milli(value: i32) -> String {
    let sign = if value < 0 { "-" } else { "" };
    let abs = value.unsigned_abs();
    format!("{}{}.{:03}", sign, abs / 1000, abs % 1000)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_dump_lines() {
        let buffer: Vec<u8> = (0..20).collect();
        let lines = format_multiline_buffer(&buffer, 0x0A00);
        assert_eq!(lines.len(), 2);
        assert_eq!(
            lines[0],
            "0A00: 00 01 02 03 04 05 06 07 08 09 0A 0B 0C 0D 0E 0F"
        );
        assert_eq!(lines[1], "0A10: 10 11 12 13");
    }

    #[test]
    fn milli_values() {
        assert_eq!(format_milli(25500), "25.500");
        assert_eq!(format_milli(12), "0.012");
        assert_eq!(format_milli(-4500), "-4.500");
        assert_eq!(format_milli(0), "0.000");
    }
}
