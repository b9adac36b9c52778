//! Content hashing helpers

use std::path::Path;
use tokio::io::AsyncReadExt;

const READ_BUF_SIZE: usize = 64 * 1024;

/// Hex-encoded blake3 hash of a byte slice
pub fn hash_bytes(buf: &[u8]) -> String {
	hex::encode(blake3::hash(buf).as_bytes())
}

/// Hex-encoded blake3 hash of a file, streaming; never loads the whole
/// file into memory.
pub async fn hash_file(path: &Path) -> std::io::Result<String> {
	let mut file = tokio::fs::File::open(path).await?;
	let mut hasher = blake3::Hasher::new();
	let mut buffer = vec![0u8; READ_BUF_SIZE];

	loop {
		let n = file.read(&mut buffer).await?;
		if n == 0 {
			break;
		}
		hasher.update(&buffer[..n]);
	}

	Ok(hex::encode(hasher.finalize().as_bytes()))
}


// vim: ts=4
