//! Error types for mirroring operations

use std::error::Error;
use std::fmt;
use std::io;

/// Main error type for sync operations
#[derive(Debug)]
pub enum SyncError {
	/// Checksum verification failed after transfer
	ChecksumMismatch { remote_id: String, expected: String, actual: String },

	/// Local I/O error (unreadable file, permission)
	Io(io::Error),

	/// Invalid configuration
	InvalidConfig { message: String },

	/// Endpoint error (nested)
	Endpoint(EndpointError),

	/// Chunk error (nested)
	Chunk(ChunkError),

	/// Snapshot state error (nested)
	State(StateError),

	/// Generic error message
	Other { message: String },
}

impl SyncError {
	/// Whether a retry of the same transfer could plausibly succeed.
	///
	/// Transport and local I/O failures are transient; a checksum mismatch
	/// after a completed transfer is a data-integrity failure and is not.
	pub fn is_retryable(&self) -> bool {
		match self {
			SyncError::ChecksumMismatch { .. } => false,
			SyncError::InvalidConfig { .. } => false,
			SyncError::Io(_) | SyncError::Endpoint(_) => true,
			SyncError::Chunk(e) => matches!(e, ChunkError::ReadFailed { .. }),
			SyncError::State(_) => false,
			SyncError::Other { .. } => false,
		}
	}
}

impl fmt::Display for SyncError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			SyncError::ChecksumMismatch { remote_id, expected, actual } => {
				write!(f, "Checksum mismatch for {}: expected {}, got {}", remote_id, expected, actual)
			}
			SyncError::Io(e) => write!(f, "I/O error: {}", e),
			SyncError::InvalidConfig { message } => {
				write!(f, "Invalid configuration: {}", message)
			}
			SyncError::Endpoint(e) => write!(f, "Endpoint error: {}", e),
			SyncError::Chunk(e) => write!(f, "Chunk error: {}", e),
			SyncError::State(e) => write!(f, "State error: {}", e),
			SyncError::Other { message } => write!(f, "{}", message),
		}
	}
}

impl Error for SyncError {}

impl From<io::Error> for SyncError {
	fn from(e: io::Error) -> Self {
		SyncError::Io(e)
	}
}

impl From<String> for SyncError {
	fn from(e: String) -> Self {
		SyncError::Other { message: e }
	}
}

impl From<EndpointError> for SyncError {
	fn from(e: EndpointError) -> Self {
		SyncError::Endpoint(e)
	}
}

impl From<ChunkError> for SyncError {
	fn from(e: ChunkError) -> Self {
		SyncError::Chunk(e)
	}
}

impl From<StateError> for SyncError {
	fn from(e: StateError) -> Self {
		SyncError::State(e)
	}
}

/// Errors raised by a sync endpoint implementation
#[derive(Debug)]
pub enum EndpointError {
	/// Object transfer failed
	TransferFailed { remote_id: String, source: Box<dyn Error + Send + Sync> },

	/// Remote object not found
	NotFound { remote_id: String },

	/// Endpoint unreachable or refused the operation
	Unavailable { message: String },

	/// Remote identifier is not acceptable to this endpoint
	InvalidIdentifier { remote_id: String },
}

impl fmt::Display for EndpointError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			EndpointError::TransferFailed { remote_id, source } => {
				write!(f, "Transfer of {} failed: {}", remote_id, source)
			}
			EndpointError::NotFound { remote_id } => write!(f, "Object not found: {}", remote_id),
			EndpointError::Unavailable { message } => write!(f, "Endpoint unavailable: {}", message),
			EndpointError::InvalidIdentifier { remote_id } => {
				write!(f, "Invalid remote identifier: {}", remote_id)
			}
		}
	}
}

impl Error for EndpointError {}

/// Chunking-specific errors
#[derive(Debug)]
pub enum ChunkError {
	/// Failed to read chunk data
	ReadFailed { source: io::Error },

	/// Invalid chunk configuration
	InvalidConfig { message: String },

	/// Manifest failed to parse or describes an impossible layout
	ManifestCorrupted { message: String },
}

impl fmt::Display for ChunkError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			ChunkError::ReadFailed { source } => write!(f, "Failed to read chunk: {}", source),
			ChunkError::InvalidConfig { message } => write!(f, "Invalid chunk config: {}", message),
			ChunkError::ManifestCorrupted { message } => {
				write!(f, "Manifest corrupted: {}", message)
			}
		}
	}
}

impl Error for ChunkError {}

impl From<io::Error> for ChunkError {
	fn from(e: io::Error) -> Self {
		ChunkError::ReadFailed { source: e }
	}
}

/// Pending-work snapshot errors
#[derive(Debug)]
pub enum StateError {
	/// Failed to load snapshot
	LoadFailed { source: Box<dyn Error + Send + Sync> },

	/// Failed to save snapshot
	SaveFailed { source: Box<dyn Error + Send + Sync> },

	/// Snapshot file is corrupted
	Corrupted { message: String },
}

impl fmt::Display for StateError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			StateError::LoadFailed { source } => write!(f, "Failed to load snapshot: {}", source),
			StateError::SaveFailed { source } => write!(f, "Failed to save snapshot: {}", source),
			StateError::Corrupted { message } => write!(f, "Snapshot corrupted: {}", message),
		}
	}
}

impl Error for StateError {}

// vim: ts=4
