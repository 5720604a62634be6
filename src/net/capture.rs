use std::io::Read;
use std::path::Path;

/// Reads length-prefixed server messages until the stream ends. Each
/// message is a little-endian u16 length followed by that many bytes.
pub fn read_messages<R: Read>(mut source: R) -> Result<Vec<Vec<u8>>, String> {
    let mut messages = Vec::new();
    loop {
        let mut header = [0u8; 2];
        match source.read_exact(&mut header) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(err) => return Err(format!("header read failed: {}", err)),
        }
        let len = u16::from_le_bytes(header) as usize;
        if len == 0 {
            return Err(format!("message {} has zero length", messages.len()));
        }
        let mut body = vec![0u8; len];
        source
            .read_exact(&mut body)
            .map_err(|err| format!("message {} payload read failed: {}", messages.len(), err))?;
        messages.push(body);
    }
    Ok(messages)
}

pub fn load(path: &Path) -> Result<Vec<Vec<u8>>, String> {
    let file = std::fs::File::open(path)
        .map_err(|err| format!("open capture {} failed: {}", path.display(), err))?;
    read_messages(std::io::BufReader::new(file))
}
