use std::{io::Write, time::Instant};

use anyhow::Context;
use compress_io::compress::CompressIo;
use crossbeam_channel::RecvTimeoutError;

use cov_engine::{IntervalRequest, TrackError, TrackId, TrackSet};

use crate::{config::Config, output};

/// Open one track per input, replay all regions against every track without
/// waiting for answers, then write out whatever was answered
pub fn process_tracks(cfg: &Config) -> anyhow::Result<()> {
    let mut tracks = TrackSet::new();
    for (i, p) in cfg.inputs().iter().enumerate() {
        let id = TrackId(i as u32 + 1);
        let h = tracks
            .open_file(id, cfg.reference(), p, cfg.track_cfg())
            .with_context(|| format!("Could not open track for {}", p.display()))?;
        info!(
            "Opened track {} for {} ({} bp)",
            id,
            p.display(),
            h.ref_len()
        );
    }

    let ids: Vec<_> = tracks.ids().collect();
    let mut pending = Vec::with_capacity(ids.len() * cfg.regions().len());
    for id in ids.iter() {
        for reg in cfg.regions() {
            let (rq, rx) = IntervalRequest::with_channel(reg.from, reg.to, *cfg.filter());
            match tracks.submit(*id, rq) {
                Ok(()) => pending.push((*id, reg, rx)),
                Err(e @ TrackError::InvalidInterval { .. }) => {
                    warn!("Track {}: skipping region {}: {}", id, reg, e)
                }
                Err(e) => {
                    return Err(e).with_context(|| {
                        format!("Could not submit request for {} to track {}", reg, id)
                    })
                }
            }
        }
    }
    debug!("Submitted {} requests", pending.len());

    let mut wrt = CompressIo::new()
        .opt_path(cfg.output_file())
        .bufwriter()
        .with_context(|| "Failed to open output file")?;
    writeln!(wrt, "{}", output::HEADER)?;

    let deadline = Instant::now() + cfg.wait();
    let (mut n_answered, mut n_superseded) = (0, 0);
    for (id, reg, rx) in pending {
        match rx.recv_deadline(deadline) {
            Ok(Ok(w)) => {
                output::write_region(&mut wrt, id, reg.from, reg.to, &w)
                    .with_context(|| "Error writing output")?;
                n_answered += 1
            }
            Ok(Err(e)) => error!("Track {}, region {}: {}", id, reg, e),
            Err(RecvTimeoutError::Disconnected) => {
                info!("Track {}: request for {} superseded", id, reg);
                n_superseded += 1
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!("Track {}: timed out waiting for {}", id, reg)
            }
        }
    }
    info!(
        "{} requests answered, {} superseded",
        n_answered, n_superseded
    );

    for id in ids {
        if let Some(h) = tracks.get(id) {
            debug!("Track {}: {}", id, h.stats())
        }
    }
    tracks.close_all();
    Ok(())
}
