//! The finalizer sequencer
//!
//! Teardown is an ordered list of steps, each tied to a finalizer marker on
//! the record. A step runs only while its marker is present; success removes
//! the marker, failure stops the sequence with the failed and remaining
//! markers intact. Because the driver persists the record afterwards, a
//! later pass resumes exactly where this one stopped.

use futures::future::BoxFuture;
use grove_types::ObjectMeta;

use crate::error::Result;

/// One teardown action tied to a finalizer marker.
pub struct TeardownStep<'a> {
    marker: &'static str,
    run: BoxFuture<'a, Result<()>>,
}

impl<'a> TeardownStep<'a> {
    pub fn new(
        marker: &'static str,
        run: impl std::future::Future<Output = Result<()>> + Send + 'a,
    ) -> Self {
        Self {
            marker,
            run: Box::pin(run),
        }
    }

    pub fn marker(&self) -> &'static str {
        self.marker
    }
}

/// Run each step whose marker is still on the record, in order.
///
/// Steps whose marker is already gone are skipped, so a sequence interrupted
/// by an earlier failure redoes only its unfinished steps.
pub async fn run_teardown(meta: &mut ObjectMeta, steps: Vec<TeardownStep<'_>>) -> Result<()> {
    for step in steps {
        if !meta.has_finalizer(step.marker) {
            continue;
        }
        step.run.await?;
        meta.remove_finalizer(step.marker);
    }
    Ok(())
}

/// Whether none of `markers` remain on the record.
pub fn teardown_complete(meta: &ObjectMeta, markers: &[&str]) -> bool {
    markers.iter().all(|marker| !meta.has_finalizer(marker))
}
