use std::{fmt::Display, io};

use indexmap::IndexSet;

/// Line-oriented assembly writer.
pub struct Emitter<W> {
    writer: W,
    indent: bool,
}

impl<W> Emitter<W>
where
    W: io::Write,
{
    pub fn new(writer: W) -> Emitter<W> {
        Emitter {
            writer,
            indent: false,
        }
    }

    /// Prints a line.
    pub fn out(&mut self, f: impl Display) -> io::Result<()> {
        let indent = if self.indent { "    " } else { "" };
        writeln!(self.writer, "{indent}{f}")
    }

    /// Prints an empty line.
    pub fn out_line(&mut self) -> io::Result<()> {
        writeln!(self.writer)
    }

    /// Prints a label definition, never indented.
    pub fn label(&mut self, label: impl Display) -> io::Result<()> {
        writeln!(self.writer, "{label}:")
    }

    pub fn set_indent(&mut self, indent: bool) {
        self.indent = indent;
    }

    /// Writes in an indented block that is finished with an empty line.
    pub fn indented<T>(&mut self, f: impl FnOnce(&mut Self) -> io::Result<T>) -> io::Result<T> {
        self.indent = true;
        let res = f(self);
        self.indent = false;
        let res = res?;
        self.out_line()?;
        Ok(res)
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.writer.flush()?;
        Ok(self.writer)
    }
}

/// String constants, numbered by first appearance.
#[derive(Debug, Default)]
pub struct StringTable {
    strings: IndexSet<String>,
}

impl StringTable {
    /// Returns the number of the string, registering it if it's new.
    pub fn intern(&mut self, string: &str) -> usize {
        match self.strings.get_index_of(string) {
            Some(index) => index,
            None => self.strings.insert_full(string.to_owned()).0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.strings.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &str)> {
        self.strings.iter().map(String::as_str).enumerate()
    }
}

/// Maps a name to a valid assembler symbol. Characters outside of
/// `[A-Za-z0-9]` are replaced by `_xHH`, one per UTF-8 byte. Underscores are
/// escaped as well, so distinct names never map to the same symbol and the
/// result never contains `_` followed by anything but an escape.
pub fn sanitize(name: &str) -> String {
    let mut symbol = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            symbol.push(c);
        } else {
            let mut buf = [0; 4];
            for byte in c.encode_utf8(&mut buf).bytes() {
                symbol.push_str(&format!("_x{byte:02X}"));
            }
        }
    }
    symbol
}

/// Escapes a string for the `.asciz` directive.
pub fn escape(string: &str) -> String {
    let mut escaped = String::with_capacity(string.len() + 2);
    for byte in string.bytes() {
        match byte {
            b'"' => escaped.push_str("\\\""),
            b'\\' => escaped.push_str("\\\\"),
            b'\n' => escaped.push_str("\\n"),
            b'\t' => escaped.push_str("\\t"),
            b'\r' => escaped.push_str("\\r"),
            0x20..=0x7E => escaped.push(char::from(byte)),
            _ => escaped.push_str(&format!("\\{byte:03o}")),
        }
    }
    escaped
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_sanitize() {
        assert_eq!(sanitize("show"), "show");
        assert_eq!(sanitize("print_int"), "print_x5Fint");
        assert_eq!(sanitize("to-str"), "to_x2Dstr");
        assert_eq!(sanitize("λ"), "_xCE_xBB");
        assert_ne!(sanitize("a-"), sanitize("a_x2D"));
    }

    #[test]
    fn test_escape() {
        assert_eq!(escape("say \"hi\"\n"), "say \\\"hi\\\"\\n");
        assert_eq!(escape("a\\b\0"), "a\\\\b\\000");
        assert_eq!(escape("é"), "\\303\\251");
    }

    #[test]
    fn test_string_table_numbers_by_first_appearance() {
        let mut table = StringTable::default();
        assert_eq!(table.intern("b"), 0);
        assert_eq!(table.intern("a"), 1);
        assert_eq!(table.intern("b"), 0);
        let strings: Vec<_> = table.iter().collect();
        assert_eq!(strings, [(0, "b"), (1, "a")]);
    }

    #[test]
    fn test_indented_block() {
        let mut e = Emitter::new(Vec::new());
        e.label("f").unwrap();
        e.indented(|e| {
            e.out("ret")?;
            e.label("inner")
        })
        .unwrap();
        e.out(".data").unwrap();
        let out = String::from_utf8(e.finish().unwrap()).unwrap();
        assert_eq!(out, "f:\n    ret\ninner:\n\n.data\n");
    }
}
