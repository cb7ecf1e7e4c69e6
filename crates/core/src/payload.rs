//! 페이로드 생성과 무결성 기준값
//!
//! [`PayloadGenerator`]는 지정 범위에서 균등하게 고른 크기의 난수 데이터를
//! 임시 파일에 쓰면서 [`ContentDigest`]를 한 번만 계산합니다. 이 다이제스트가
//! 업로드 후 다운로드한 데이터와 비교할 기준값입니다.

use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use md5::{Digest, Md5};
use rand::rngs::StdRng;
use rand::{Rng, RngCore, SeedableRng};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::EnvelopeError;

/// 난수 데이터를 쓸 때 한 번에 채우는 블록 크기
const CHUNK_SIZE: usize = 1024 * 1024;

/// 콘텐츠 다이제스트 (MD5, 소문자 hex로 표기)
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContentDigest([u8; 16]);

impl ContentDigest {
    /// 바이트 전체의 다이제스트를 계산합니다.
    pub fn compute(data: &[u8]) -> Self {
        Self(Md5::digest(data).into())
    }

    /// 원시 바이트
    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// 소문자 hex 문자열
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = EnvelopeError;

    /// hex 문자열을 파싱합니다. 대소문자와 앞뒤 따옴표(ETag 형식)를 허용합니다.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim().trim_matches('"');
        let mut out = [0u8; 16];
        hex::decode_to_slice(trimmed, &mut out).map_err(|e| EnvelopeError::Digest {
            value: s.to_owned(),
            reason: e.to_string(),
        })?;
        Ok(Self(out))
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// 디스크에 쓰인 페이로드
///
/// 드롭되면 임시 파일이 삭제됩니다.
#[derive(Debug)]
pub struct Payload {
    file: NamedTempFile,
    size: u64,
    digest: ContentDigest,
}

impl Payload {
    /// 임시 파일 경로
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// 크기 (바이트)
    pub fn size(&self) -> u64 {
        self.size
    }

    /// 생성 시 계산한 다이제스트
    pub fn digest(&self) -> ContentDigest {
        self.digest
    }
}

/// 페이로드 생성기
#[derive(Debug, Clone)]
pub struct PayloadGenerator {
    min_bytes: u64,
    max_bytes: u64,
    temp_dir: Option<PathBuf>,
    seed: Option<u64>,
}

impl PayloadGenerator {
    /// `[min_bytes, max_bytes]` 범위의 생성기를 만듭니다.
    pub fn new(min_bytes: u64, max_bytes: u64) -> Self {
        Self {
            min_bytes,
            max_bytes: max_bytes.max(min_bytes),
            temp_dir: None,
            seed: None,
        }
    }

    /// 임시 파일 디렉토리를 지정합니다.
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// 재현 가능한 생성을 위한 시드를 지정합니다.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// 페이로드를 생성합니다.
    ///
    /// 블로킹 I/O를 수행하므로 async 컨텍스트에서는 `spawn_blocking`으로 호출합니다.
    pub fn generate(&self) -> std::io::Result<Payload> {
        let mut rng = match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let size = rng.gen_range(self.min_bytes..=self.max_bytes);

        let mut builder = tempfile::Builder::new();
        builder.prefix("claimcheck-").suffix(".bin");
        let mut file = match &self.temp_dir {
            Some(dir) => builder.tempfile_in(dir)?,
            None => builder.tempfile()?,
        };

        let mut hasher = Md5::new();
        let mut chunk = vec![0u8; CHUNK_SIZE];
        let mut remaining = size;
        while remaining > 0 {
            let n = remaining.min(CHUNK_SIZE as u64) as usize;
            rng.fill_bytes(&mut chunk[..n]);
            hasher.update(&chunk[..n]);
            file.write_all(&chunk[..n])?;
            remaining -= n as u64;
        }
        file.flush()?;

        let digest = ContentDigest(hasher.finalize().into());
        debug!(
            path = %file.path().display(),
            size,
            digest = %digest,
            "payload generated"
        );

        Ok(Payload { file, size, digest })
    }
}
