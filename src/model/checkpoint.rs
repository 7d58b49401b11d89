//! Binary checkpoints for trained networks.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::{info, warn};

use super::Network;
use crate::error::Result;

pub fn save<T, P>(model: &T, path: P) -> Result<()>
where
    T: Network + Serialize,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut writer = BufWriter::new(File::create(path)?);
    bincode::serialize_into(&mut writer, model)?;
    writer.flush()?;

    info!(path = %path.display(), parameters = model.parameter_count(), "saved checkpoint");
    Ok(())
}

/// Loads a network and checks that its layers still chain together.
pub fn load<T, P>(path: P) -> Result<T>
where
    T: Network + DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)?;
    let model: T = bincode::deserialize_from(BufReader::new(file))?;

    if let Err(e) = model.validate() {
        warn!(path = %path.display(), error = %e, "checkpoint failed validation");
        return Err(e);
    }

    info!(path = %path.display(), parameters = model.parameter_count(), "loaded checkpoint");
    Ok(model)
}
