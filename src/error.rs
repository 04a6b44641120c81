use thiserror::Error;

use crate::graph::VertexId;

/// Errors raised by the hike-planning core.
///
/// `DisconnectedPeak` and `ClusterTooLarge` are non-fatal: callers log them
/// and keep going with a partial plan (see spec.md §7). `MalformedGraph` and
/// `InfeasibleCover` are fatal: no plan is emitted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum HikeError {
	#[error("malformed graph: {reason}")]
	MalformedGraph { reason: String },

	#[error("unknown vertex id {id}")]
	MissingVertex { id: VertexId },

	#[error("peak {peak} has no trail neighbor and is excluded from clustering")]
	DisconnectedPeak { peak: VertexId },

	#[error("cluster of {peak_count} peaks exceeded the enumeration budget; skipped")]
	ClusterTooLarge { peak_count: usize },

	#[error("no hike covers required peak(s): {peaks:?}")]
	InfeasibleCover { peaks: Vec<VertexId> },
}

pub type Result<T> = std::result::Result<T, HikeError>;
