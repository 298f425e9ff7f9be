//! Downloads Kepler light curves for every target in a catalogue table.
//!
//! Targets are fetched concurrently into the output directory, skipping
//! files that already exist. A summary is logged when the batch finishes and
//! failures are listed in an error log file. Archive and cache settings come
//! from `LCACQ_*` environment variables parsed by
//! [`OrthoConfig`](https://github.com/leynos/ortho-config). The binary exits
//! with status code `0` even when individual targets fail, and `1` when the
//! run itself cannot proceed.

fn main() -> color_eyre::eyre::Result<()> {
    lightcurve_acquire::run().map_err(|err| color_eyre::eyre::eyre!(err))?;
    Ok(())
}
