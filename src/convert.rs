use std::io;
use std::path::{Path, PathBuf};

use hmi_codec::{decode, encode_hmp, encode_midi, DecodeError, SourceFormat};
use hmi_core::{prepare_for_hmp, prepare_for_midi, remap_programs, FmBank, Sequence};
use hog::HogError;
use thiserror::Error;
use tracing::{debug, info};

use crate::location::{ContainerCache, Location};
use crate::prompt::Confirm;

/// Run configuration, built from the command line
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Replace existing destinations without asking
    pub overwrite: bool,
    /// HMP to MIDI: give tracks without a volume controller volume 0, the
    /// way the DOS driver plays them
    pub faithful: bool,
    /// MIDI to HMP: also write an HMQ remapped for this FM bank
    pub fm_bank: Option<FmBank>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Converted { written: Vec<PathBuf> },
    /// The user declined to overwrite a destination. `written` holds what was
    /// saved before that, e.g. the HMP when only the HMQ was declined.
    Skipped { written: Vec<PathBuf> },
}

#[derive(Debug, Error)]
pub enum ConvertError {
    #[error("could not decode {}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DecodeError,
    },

    #[error("could not access {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("HOG archive error for {}", path.display())]
    Container {
        path: PathBuf,
        #[source]
        source: HogError,
    },
}

/// Convert a Standard MIDI File to HMP, plus an HMQ when an FM bank is set
pub fn convert_midi_to_hmp(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: &ConvertOptions,
    cache: &mut ContainerCache,
    prompt: &mut dyn Confirm,
) -> Result<Outcome, ConvertError> {
    let target = target.as_ref();
    let mut seq = load(source.as_ref(), SourceFormat::Midi, cache)?;
    prepare_for_hmp(&mut seq);

    let hmp = cache.resolve(target)?;
    if !may_write(&hmp, options, prompt) {
        return Ok(Outcome::Skipped { written: vec![] });
    }
    hmp.replace(encode_hmp(&seq))?;
    let mut written = vec![hmp.path()];

    if let Some(bank) = options.fm_bank {
        let (melodic, drums) = bank.bank_files();
        info!("preparing HMQ for {melodic} / {drums}");
        let remapped = remap_programs(&mut seq, bank.program_map());
        debug!(remapped, "program changes remapped");

        let hmq = cache.resolve(target.with_extension("hmq"))?;
        if !may_write(&hmq, options, prompt) {
            info!("kept existing {hmq}");
            return Ok(Outcome::Skipped { written });
        }
        hmq.replace(encode_hmp(&seq))?;
        written.push(hmq.path());
    }

    Ok(Outcome::Converted { written })
}

/// Convert an HMP or HMQ file to a type 1 Standard MIDI File at 480 PPQN
pub fn convert_hmp_to_midi(
    source: impl AsRef<Path>,
    target: impl AsRef<Path>,
    options: &ConvertOptions,
    cache: &mut ContainerCache,
    prompt: &mut dyn Confirm,
) -> Result<Outcome, ConvertError> {
    let mut seq = load(source.as_ref(), SourceFormat::Hmp, cache)?;
    prepare_for_midi(&mut seq, options.faithful);

    let midi = cache.resolve(target)?;
    if !may_write(&midi, options, prompt) {
        return Ok(Outcome::Skipped { written: vec![] });
    }
    let bytes = encode_midi(&seq).map_err(|err| match err {
        hmi_codec::EncodeError::Io(source) => ConvertError::Io {
            path: midi.path(),
            source,
        },
    })?;
    midi.replace(bytes)?;

    Ok(Outcome::Converted {
        written: vec![midi.path()],
    })
}

fn load(
    path: &Path,
    format: SourceFormat,
    cache: &mut ContainerCache,
) -> Result<Sequence, ConvertError> {
    let location = cache.resolve(path)?;
    let bytes = location.read()?;
    let seq = decode(&bytes, format).map_err(|source| ConvertError::Decode {
        path: location.path(),
        source,
    })?;
    debug!(
        path = %location,
        format = format.name(),
        tracks = seq.tracks.len(),
        ppqn = seq.ppqn,
        "loaded"
    );
    Ok(seq)
}

fn may_write(location: &Location, options: &ConvertOptions, prompt: &mut dyn Confirm) -> bool {
    options.overwrite
        || !location.exists()
        || prompt.confirm(&format!("{location} already exists. Overwrite"))
}
