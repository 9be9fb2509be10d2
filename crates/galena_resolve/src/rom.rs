//! ROM primitive detection and data file loading.
//!
//! A module whose name starts with `rom_` and whose body is empty (no
//! assignments, procedures, or child instances) with exactly one input
//! (the address) and one output (the data) is a ROM primitive. Its
//! contents come from `{name without rom_}.txt`, searched in the
//! referrer's directory, a `roms/` directory beside it, and `roms/` under
//! the working directory.

use crate::error::ResolveError;
use crate::module::PortDirection;
use galena_sv_parser::ast::{ModuleDecl, ModuleItem};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Loaded ROM contents: a sparse address → word map plus the port widths.
///
/// Unlisted addresses read as zero, which makes the sparse `addr:value`
/// file layout and the dense one-line-per-word layout equivalent.
#[derive(Clone, Debug)]
pub struct RomData {
    /// The data file the contents came from.
    pub path: PathBuf,
    /// Address port width in bits.
    pub addr_width: u32,
    /// Data port width in bits.
    pub data_width: u32,
    words: HashMap<u64, u64>,
}

impl RomData {
    /// Reads the word at `addr`; unlisted addresses are zero.
    pub fn read(&self, addr: u64) -> u64 {
        self.words.get(&addr).copied().unwrap_or(0)
    }

    /// Number of addresses the ROM can decode.
    pub fn depth(&self) -> u64 {
        1u64.checked_shl(self.addr_width).unwrap_or(u64::MAX)
    }
}

/// Returns `true` if the declaration has the shape of a ROM primitive.
///
/// The name prefix alone is not enough; a `rom_`-named module with a body
/// is an ordinary module.
pub fn is_rom_shape(name_text: &str, ast: &ModuleDecl, inputs: usize, outputs: usize) -> bool {
    if !name_text.starts_with("rom_") {
        return false;
    }
    let body_empty = ast.items.iter().all(|item| {
        matches!(item, ModuleItem::Port(_)) || matches!(item, ModuleItem::Net(_))
    });
    body_empty && inputs == 1 && outputs == 1
}

/// Locates and parses the data file for a ROM primitive.
///
/// `module_dir` is the directory of the ROM's own `.sv` file. The file is
/// searched there, in `module_dir/roms/`, and in `./roms/`.
pub fn load_rom_data(
    module_name: &str,
    module_dir: &Path,
    addr_width: u32,
    data_width: u32,
) -> Result<RomData, ResolveError> {
    let file_name = format!("{}.txt", module_name.trim_start_matches("rom_"));

    let candidates = [
        module_dir.join(&file_name),
        module_dir.join("roms").join(&file_name),
        PathBuf::from("roms").join(&file_name),
    ];
    let path = candidates
        .iter()
        .find(|p| p.is_file())
        .cloned()
        .ok_or_else(|| ResolveError::RomDataMissing {
            module: module_name.to_string(),
            file: file_name.clone(),
        })?;

    let text = std::fs::read_to_string(&path).map_err(|source| ResolveError::Io {
        path: path.clone(),
        source,
    })?;

    let words = parse_rom_text(&text, &path, data_width)?;
    Ok(RomData {
        path,
        addr_width,
        data_width,
        words,
    })
}

/// Reads a memory initialization file in the same format as ROM data:
/// one binary word per line or sparse `addr:word` lines. Used by the
/// test facade's `memory_files` preloads.
pub fn read_memory_file(
    path: &Path,
    data_width: u32,
) -> Result<HashMap<u64, u64>, ResolveError> {
    let text = std::fs::read_to_string(path).map_err(|source| ResolveError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_rom_text(&text, path, data_width)
}

/// Parses ROM data text: one binary word per line, or `addr:word` for
/// sparse layouts. `#` and `//` lines are comments; blank lines are
/// skipped.
fn parse_rom_text(
    text: &str,
    path: &Path,
    data_width: u32,
) -> Result<HashMap<u64, u64>, ResolveError> {
    let mut words = HashMap::new();
    let mut next_addr = 0u64;

    for (idx, raw) in text.lines().enumerate() {
        let line = raw.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with("//") {
            continue;
        }

        let bad = |message: String| ResolveError::RomDataInvalid {
            path: path.to_path_buf(),
            line: idx + 1,
            message,
        };

        let (addr, bits) = match line.split_once(':') {
            Some((a, b)) => {
                let addr = a
                    .trim()
                    .parse::<u64>()
                    .map_err(|_| bad(format!("bad address '{}'", a.trim())))?;
                (addr, b.trim())
            }
            None => (next_addr, line),
        };

        if bits.len() != data_width as usize {
            return Err(bad(format!(
                "expected {} binary digits, found {}",
                data_width,
                bits.len()
            )));
        }
        let value = u64::from_str_radix(bits, 2)
            .map_err(|_| bad(format!("'{bits}' is not a binary value")))?;

        words.insert(addr, value);
        next_addr = addr + 1;
    }

    Ok(words)
}

/// Splits a ROM primitive's ports into (address input, data output) by
/// direction. Returns `None` if the shape check was not done first.
pub fn rom_port_widths(ports: &[crate::module::Port]) -> Option<(u32, u32)> {
    let addr = ports.iter().find(|p| p.direction == PortDirection::Input)?;
    let data = ports.iter().find(|p| p.direction == PortDirection::Output)?;
    Some((addr.width, data.width))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dense_layout() {
        let words = parse_rom_text(
            "11011110\n10101101\n10111110\n11101111\n",
            Path::new("deadbeef.txt"),
            8,
        )
        .unwrap();
        assert_eq!(words[&0], 0b1101_1110);
        assert_eq!(words[&1], 0b1010_1101);
        assert_eq!(words[&2], 0b1011_1110);
        assert_eq!(words[&3], 0b1110_1111);
    }

    #[test]
    fn comments_and_blanks_skipped() {
        let words = parse_rom_text(
            "# header\n\n// note\n0101\n\n1111\n",
            Path::new("r.txt"),
            4,
        )
        .unwrap();
        assert_eq!(words[&0], 0b0101);
        assert_eq!(words[&1], 0b1111);
    }

    #[test]
    fn sparse_layout() {
        let words = parse_rom_text("5:1010\n1100\n", Path::new("r.txt"), 4).unwrap();
        assert_eq!(words[&5], 0b1010);
        // A bare line after addr:value continues from the next address.
        assert_eq!(words[&6], 0b1100);
        assert!(!words.contains_key(&0));
    }

    #[test]
    fn wrong_word_length_rejected() {
        let err = parse_rom_text("101\n", Path::new("r.txt"), 8).unwrap_err();
        assert!(err.to_string().contains("expected 8 binary digits"));
    }

    #[test]
    fn non_binary_rejected() {
        let err = parse_rom_text("10f0\n", Path::new("r.txt"), 4).unwrap_err();
        assert!(err.to_string().contains("not a binary value"));
    }

    #[test]
    fn bad_address_rejected() {
        let err = parse_rom_text("x7:1010\n", Path::new("r.txt"), 4).unwrap_err();
        assert!(err.to_string().contains("bad address"));
    }

    #[test]
    fn rom_data_read_defaults_zero() {
        let rom = RomData {
            path: PathBuf::from("r.txt"),
            addr_width: 2,
            data_width: 8,
            words: HashMap::from([(1, 42)]),
        };
        assert_eq!(rom.read(1), 42);
        assert_eq!(rom.read(0), 0);
        assert_eq!(rom.read(3), 0);
        assert_eq!(rom.depth(), 4);
    }

    #[test]
    fn missing_file_reports_name() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_rom_data("rom_boot", dir.path(), 4, 8).unwrap_err();
        assert!(matches!(err, ResolveError::RomDataMissing { .. }));
        assert!(err.to_string().contains("boot.txt"));
    }

    #[test]
    fn search_order_prefers_module_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("roms")).unwrap();
        std::fs::write(dir.path().join("roms").join("boot.txt"), "1111\n").unwrap();
        std::fs::write(dir.path().join("boot.txt"), "0001\n").unwrap();

        let rom = load_rom_data("rom_boot", dir.path(), 2, 4).unwrap();
        assert_eq!(rom.read(0), 0b0001);
    }

    #[test]
    fn falls_back_to_roms_subdir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("roms")).unwrap();
        std::fs::write(dir.path().join("roms").join("boot.txt"), "1111\n").unwrap();

        let rom = load_rom_data("rom_boot", dir.path(), 2, 4).unwrap();
        assert_eq!(rom.read(0), 0b1111);
    }
}
