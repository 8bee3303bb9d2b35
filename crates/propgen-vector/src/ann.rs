//! Approximate-nearest-neighbor index maintenance.
//!
//! Small tables are served by a brute-force scan; once enough vectors are
//! committed, an IVF_PQ index is trained over the vector column. Parameter
//! choices follow the usual sqrt(N) partition heuristic, clamped for tiny
//! and huge tables.

use lancedb::index::vector::IvfPqIndexBuilder;
use lancedb::index::Index;
use lancedb::table::Table;
use lancedb::DistanceType;

use propgen_core::error::{Error, Result};

/// Below this row count PQ training is not worth it (and may not converge).
pub const MIN_ROWS_FOR_ANN: usize = 256;

pub struct IvfPqParams {
    pub nlist: usize,
    pub m: usize,
    pub nbits: usize,
}

pub fn compute_ivfpq_params(total_rows: usize, dim: usize) -> IvfPqParams {
    let sqrt_n = (total_rows as f64).sqrt() as usize;
    let mut nlist = std::cmp::max(64, 2 * sqrt_n);
    nlist = std::cmp::min(nlist, 65_536);
    if total_rows > 1 {
        nlist = std::cmp::min(nlist, total_rows - 1);
    } else {
        nlist = 1;
    }
    let m = if dim >= 1024 { 32 } else { 16 };
    IvfPqParams { nlist, m, nbits: 8 }
}

pub async fn build_ivfpq_index(table: &Table, params: &IvfPqParams) -> Result<()> {
    table
        .create_index(
            &["vector"],
            Index::IvfPq(
                IvfPqIndexBuilder::default()
                    .distance_type(DistanceType::Cosine)
                    .num_partitions(params.nlist as u32)
                    .num_sub_vectors(params.m as u32),
            ),
        )
        .execute()
        .await
        .map_err(Error::store)?;
    Ok(())
}

/// Train the ANN index when the table has grown past the threshold.
/// A no-op for small tables; errors out of PQ training are surfaced.
pub async fn ensure_ann_index(table: &Table, total_rows: usize, dim: usize) -> Result<bool> {
    if total_rows < MIN_ROWS_FOR_ANN {
        return Ok(false);
    }
    let params = compute_ivfpq_params(total_rows, dim);
    tracing::info!(rows = total_rows, nlist = params.nlist, m = params.m, "building IVF_PQ index");
    build_ivfpq_index(table, &params).await?;
    Ok(true)
}
