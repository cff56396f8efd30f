use std::{fmt, path::Path};

use sha2::Digest as _;
use sha2::digest::DynDigest;
use tokio::io::AsyncReadExt;

/// Algorithm used to compute a content hash.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HashAlgorithm {
    SHA256,
    SHA512,
}

impl HashAlgorithm {
    fn prefix(&self) -> &'static str {
        match self {
            HashAlgorithm::SHA256 => "sha256",
            HashAlgorithm::SHA512 => "sha512",
        }
    }

    fn hex_len(&self) -> usize {
        match self {
            HashAlgorithm::SHA256 => 256 / 8 * 2,
            HashAlgorithm::SHA512 => 512 / 8 * 2,
        }
    }

    fn hasher(&self) -> Box<dyn DynDigest + Send> {
        match self {
            HashAlgorithm::SHA256 => Box::new(sha2::Sha256::new()),
            HashAlgorithm::SHA512 => Box::new(sha2::Sha512::new()),
        }
    }
}

/// Hash of an image, as declared by a library or computed locally.
///
/// Two spellings are accepted: the library form `sha256.<hex>` and the
/// OCI form `sha256:<hex>`.
///
/// ```
/// # use imgpull::digest::*;
/// const HEX: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";
///
/// let library = ContentHash::parse(&format!("sha256.{HEX}")).unwrap();
/// let oci = ContentHash::parse(&format!("sha256:{}", HEX.to_uppercase())).unwrap();
/// assert_eq!(library.algorithm(), HashAlgorithm::SHA256);
/// assert!(library.matches(&oci));
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentHash {
    source: String,
    algorithm: HashAlgorithm,
}

#[derive(thiserror::Error, Debug, PartialEq)]
pub enum DigestError {
    #[error("Invalid hash algorithm in {0:?}.")]
    InvalidAlgorithm(String),

    #[error("Invalid hash value in {0:?}.")]
    InvalidValue(String),
}

impl ContentHash {
    pub fn parse(source: &str) -> Result<Self, DigestError> {
        let (algorithm, value) = [HashAlgorithm::SHA256, HashAlgorithm::SHA512]
            .into_iter()
            .find_map(|alg| {
                let tail = source.strip_prefix(alg.prefix())?;
                let value = tail.strip_prefix('.').or_else(|| tail.strip_prefix(':'))?;
                Some((alg, value))
            })
            .ok_or_else(|| DigestError::InvalidAlgorithm(source.to_string()))?;

        if value.len() == algorithm.hex_len() && value.chars().all(|c| c.is_ascii_hexdigit()) {
            Ok(ContentHash {
                source: source.to_string(),
                algorithm,
            })
        } else {
            Err(DigestError::InvalidValue(source.to_string()))
        }
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Original string, as declared.
    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn hex(&self) -> &str {
        &self.source[self.algorithm.prefix().len() + 1..]
    }

    /// Same algorithm and same value, regardless of spelling.
    pub fn matches(&self, other: &ContentHash) -> bool {
        self.algorithm == other.algorithm && self.hex().eq_ignore_ascii_case(other.hex())
    }

    fn from_output(algorithm: HashAlgorithm, output: &[u8]) -> Self {
        ContentHash {
            source: format!("{}.{}", algorithm.prefix(), hex::encode(output)),
            algorithm,
        }
    }

    /// Hash an in-memory buffer.
    pub fn of_bytes(algorithm: HashAlgorithm, data: &[u8]) -> Self {
        let mut hasher = algorithm.hasher();
        hasher.update(data);
        Self::from_output(algorithm, &hasher.finalize())
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.source)
    }
}

/// Read `path` to the end and compute its hash.
pub async fn hash_file(path: &Path, algorithm: HashAlgorithm) -> std::io::Result<ContentHash> {
    const CHUNK: usize = 64 * 1024;

    let mut file = tokio::fs::File::open(path).await?;
    let mut hasher = algorithm.hasher();
    let mut buffer = vec![0u8; CHUNK];

    loop {
        let n = file.read(&mut buffer).await?;
        if n == 0 {
            break;
        }
        hasher.update(&buffer[..n]);
    }

    Ok(ContentHash::from_output(algorithm, &hasher.finalize()))
}
