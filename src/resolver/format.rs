//! URL based source format detection.

/// Container of the file a source URL points at, guessed from the URL text.
///
/// Only used for logging and to pick the scratch file extension; the
/// pipeline always transcodes regardless of what is detected here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceFormat {
    Mflac,
    Flac,
    Aac,
    M4a,
    Wav,
    Mp3,
}

impl SourceFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SourceFormat::Mflac => ".mflac",
            SourceFormat::Flac => ".flac",
            SourceFormat::Aac => ".aac",
            SourceFormat::M4a => ".m4a",
            SourceFormat::Wav => ".wav",
            SourceFormat::Mp3 => ".mp3",
        }
    }
}

impl std::fmt::Display for SourceFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.extension()[1..])
    }
}

/// Classifies a source URL, first match wins. Anything unrecognised is mp3.
pub fn detect_source_format(url: &str) -> SourceFormat {
    let url = url.to_lowercase();
    if url.contains("mflac") {
        SourceFormat::Mflac
    } else if url.contains(".flac") {
        SourceFormat::Flac
    } else if url.contains(".aac") {
        SourceFormat::Aac
    } else if url.contains(".m4a") {
        SourceFormat::M4a
    } else if url.contains(".wav") {
        SourceFormat::Wav
    } else {
        SourceFormat::Mp3
    }
}

/// Lyric endpoint for a song: `{lyric_base}?id={external_id}`.
pub fn build_lyric_url(lyric_base: &str, external_id: &str) -> String {
    format!(
        "{}?id={}",
        lyric_base,
        urlencoding::encode(external_id)
    )
}
