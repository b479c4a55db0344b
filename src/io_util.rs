use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

pub fn write_u32<W: Write>(w: &mut W, v: u32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_i64<W: Write>(w: &mut W, v: i64) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_f32<W: Write>(w: &mut W, v: f32) -> io::Result<()> {
    w.write_all(&v.to_le_bytes())
}

pub fn write_str<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    write_u32(w, s.len() as u32)?;
    w.write_all(s.as_bytes())
}

pub fn read_u32<R: Read>(r: &mut R) -> io::Result<u32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(u32::from_le_bytes(buf))
}

pub fn read_i64<R: Read>(r: &mut R) -> io::Result<i64> {
    let mut buf = [0u8; 8];
    r.read_exact(&mut buf)?;
    Ok(i64::from_le_bytes(buf))
}

pub fn read_f32<R: Read>(r: &mut R) -> io::Result<f32> {
    let mut buf = [0u8; 4];
    r.read_exact(&mut buf)?;
    Ok(f32::from_le_bytes(buf))
}

pub fn read_str<R: Read>(r: &mut R) -> io::Result<String> {
    let len = read_u32(r)? as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// `u16`-length-prefixed string, used by the binary lexicon cache whose
/// on-disk layout is spec-mandated as `(u16 len, bytes)` rather than the
/// `u32`-prefixed framing used elsewhere in this crate.
pub fn write_str16<W: Write>(w: &mut W, s: &str) -> io::Result<()> {
    let bytes = s.as_bytes();
    w.write_all(&(bytes.len() as u16).to_le_bytes())?;
    w.write_all(bytes)
}

pub fn read_str16<R: Read>(r: &mut R) -> io::Result<String> {
    let mut len_buf = [0u8; 2];
    r.read_exact(&mut len_buf)?;
    let len = u16::from_le_bytes(len_buf) as usize;
    let mut buf = vec![0u8; len];
    r.read_exact(&mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

pub fn write_tf_map<W: Write>(w: &mut W, map: &HashMap<String, u32>) -> io::Result<()> {
    write_u32(w, map.len() as u32)?;
    for (word, freq) in map {
        write_str(w, word)?;
        write_u32(w, *freq)?;
    }
    Ok(())
}

pub fn read_tf_map<R: Read>(r: &mut R) -> io::Result<HashMap<String, u32>> {
    let n = read_u32(r)? as usize;
    let mut map = HashMap::with_capacity(n);
    for _ in 0..n {
        let word = read_str(r)?;
        let freq = read_u32(r)?;
        map.insert(word, freq);
    }
    Ok(map)
}

/// Write `s`, truncated or NUL-padded to exactly `width` bytes.
pub fn write_fixed<W: Write>(w: &mut W, s: &str, width: usize) -> io::Result<()> {
    let mut buf = vec![0u8; width];
    let src = s.as_bytes();
    let n = src.len().min(width);
    buf[..n].copy_from_slice(&src[..n]);
    w.write_all(&buf)
}

pub fn read_fixed<R: Read>(r: &mut R, width: usize) -> io::Result<String> {
    let mut buf = vec![0u8; width];
    r.read_exact(&mut buf)?;
    let end = buf.iter().position(|&b| b == 0).unwrap_or(buf.len());
    Ok(String::from_utf8_lossy(&buf[..end]).into_owned())
}

fn temp_sibling(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Atomically replace `path` with `contents`: write to a sibling temp file,
/// then rename. Every persisted JSON/binary artifact in this crate goes
/// through this so readers never observe a partial file.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let tmp_path = temp_sibling(path);
    {
        let mut f = std::fs::File::create(&tmp_path)?;
        f.write_all(contents)?;
        f.flush()?;
    }
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}
