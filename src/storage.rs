use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
};

use crate::backend::ObjectStorage;
use crate::error::{Error, Result};


/// Object storage on the local filesystem. Objects live flat under one
/// directory and are served from `public_prefix`.
pub struct DirStorage {
    dir: PathBuf,
    public_prefix: String,
}

impl DirStorage {
    pub fn open<P: AsRef<Path>>(dir: P, public_prefix: &str) -> Result<Self> {
        fs::create_dir_all(dir.as_ref())?;

        Ok(DirStorage {
            dir: dir.as_ref().to_path_buf(),
            public_prefix: public_prefix.trim_end_matches('/').to_owned(),
        })
    }

    #[cfg(test)]
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

fn verify_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > 256 || key.contains("..")
        || key.contains('/') || key.contains('\\') {
        Err(Error::validation("Invalid object key"))
    }
    else {
        Ok(())
    }
}

impl ObjectStorage for DirStorage {
    fn upload(&self, key: &str, bytes: &[u8]) -> Result<String> {
        verify_key(key)?;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(self.dir.join(key))?;
        file.write_all(bytes)?;

        Ok(key.to_owned())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_prefix, key)
    }
}
