//! Maps a media type and an algorithm name to a configured optimizer call.
//!
//! Every algorithm has exactly one hardcoded tuning. Nothing here touches the
//! file system; [`select_operation`] is a pure lookup and safe to call from
//! any thread.

use std::ffi::OsString;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use serde::{Deserialize, Serialize};
use crate::utils::MediaFamily;

// ── Fixed tuning ──────────────────────────────────────────────────────────────

const JPEGOPTIM_MAX_QUALITY: u32 = 70;
const MOZJPEG_QUALITY: u32 = 70;
const ADVPNG_LEVEL: u32 = 4; // 4 = insane
const OPTIPNG_LEVEL: u32 = 5;
const PNGOUT_STRATEGY: u32 = 0; // 0 = extreme
const GIFSICLE_LEVEL: u32 = 3;
const GIFLOSSY_LOSSINESS: u32 = 80;

/// Known algorithm identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    Jpegoptim,
    Jpegtran,
    Mozjpeg,
    Advpng,
    Optipng,
    Pngcrush,
    Pngout,
    Zopfli,
    Svgo,
    Giflossy,
    Gifsicle,
}

impl Algorithm {
    pub const ALL: [Algorithm; 11] = [
        Self::Jpegoptim,
        Self::Jpegtran,
        Self::Mozjpeg,
        Self::Advpng,
        Self::Optipng,
        Self::Pngcrush,
        Self::Pngout,
        Self::Zopfli,
        Self::Svgo,
        Self::Giflossy,
        Self::Gifsicle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Jpegoptim => "jpegoptim",
            Self::Jpegtran => "jpegtran",
            Self::Mozjpeg => "mozjpeg",
            Self::Advpng => "advpng",
            Self::Optipng => "optipng",
            Self::Pngcrush => "pngcrush",
            Self::Pngout => "pngout",
            Self::Zopfli => "zopfli",
            Self::Svgo => "svgo",
            Self::Giflossy => "giflossy",
            Self::Gifsicle => "gifsicle",
        }
    }

    pub fn family(&self) -> MediaFamily {
        match self {
            Self::Jpegoptim | Self::Jpegtran | Self::Mozjpeg => MediaFamily::Jpeg,
            Self::Advpng | Self::Optipng | Self::Pngcrush | Self::Pngout | Self::Zopfli => {
                MediaFamily::Png
            }
            Self::Svgo => MediaFamily::Svg,
            Self::Giflossy | Self::Gifsicle => MediaFamily::Gif,
        }
    }

    /// Executable the algorithm is implemented by
    pub fn program(&self) -> &'static str {
        match self {
            Self::Mozjpeg => "cjpeg",
            Self::Zopfli => "zopflipng",
            Self::Giflossy | Self::Gifsicle => "gifsicle",
            other => other.name(),
        }
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Algorithm {
    type Err = String;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|a| a.name() == name)
            .ok_or_else(|| format!("Unknown algorithm: {name}"))
    }
}

/// Members of a family, in their canonical order.
pub fn family_algorithms(family: MediaFamily) -> Vec<Algorithm> {
    Algorithm::ALL
        .into_iter()
        .filter(|a| a.family() == family)
        .collect()
}

/// How an optimizer produces its output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Invocation {
    /// Reads the input and writes a separate output file
    Transform,
    /// Rewrites the file it is given; the caller hands it a copy
    InPlace,
}

/// A ready-to-invoke optimizer call with its fixed tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    algorithm: Algorithm,
    invocation: Invocation,
}

impl Operation {
    fn new(algorithm: Algorithm) -> Self {
        let invocation = match algorithm {
            Algorithm::Jpegoptim | Algorithm::Advpng => Invocation::InPlace,
            _ => Invocation::Transform,
        };
        Self { algorithm, invocation }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn invocation(&self) -> Invocation {
        self.invocation
    }

    pub fn program(&self) -> &'static str {
        self.algorithm.program()
    }

    /// Exit codes meaning "ran fine, could not shrink the file".
    ///
    /// The tool may leave no output behind on these; the input is then the
    /// result.
    pub fn no_gain_exit_codes(&self) -> &'static [i32] {
        match self.algorithm {
            Algorithm::Pngout => &[2],
            _ => &[],
        }
    }

    /// Command-line arguments turning `input` into `output`.
    ///
    /// For [`Invocation::InPlace`] operations only `output` is passed; it must
    /// already hold a copy of the input.
    pub fn args(&self, input: &Path, output: &Path) -> Vec<OsString> {
        let input = input.as_os_str().to_os_string();
        let output = output.as_os_str().to_os_string();
        let flags = |flags: &[String]| flags.iter().map(OsString::from).collect::<Vec<_>>();

        match self.algorithm {
            Algorithm::Jpegoptim => {
                let mut args = flags(&[
                    format!("--max={JPEGOPTIM_MAX_QUALITY}"),
                    "--strip-all".into(),
                    "--quiet".into(),
                ]);
                args.push(output);
                args
            }
            Algorithm::Jpegtran => {
                let mut args = flags(&[
                    "-copy".into(),
                    "none".into(),
                    "-optimize".into(),
                    "-progressive".into(),
                    "-outfile".into(),
                ]);
                args.extend([output, input]);
                args
            }
            Algorithm::Mozjpeg => {
                let mut args = flags(&[
                    "-quality".into(),
                    MOZJPEG_QUALITY.to_string(),
                    "-outfile".into(),
                ]);
                args.extend([output, input]);
                args
            }
            Algorithm::Advpng => {
                let mut args = flags(&[
                    "--recompress".into(),
                    format!("-{ADVPNG_LEVEL}"),
                    "--quiet".into(),
                ]);
                args.push(output);
                args
            }
            Algorithm::Optipng => {
                let mut args = flags(&[
                    format!("-o{OPTIPNG_LEVEL}"),
                    "-quiet".into(),
                    "-clobber".into(),
                    "-out".into(),
                ]);
                args.extend([output, input]);
                args
            }
            Algorithm::Pngcrush => {
                let mut args = flags(&["-reduce".into(), "-brute".into(), "-q".into()]);
                args.extend([input, output]);
                args
            }
            Algorithm::Pngout => {
                let mut args = vec![input, output];
                args.extend(flags(&[format!("-s{PNGOUT_STRATEGY}"), "-y".into(), "-q".into()]));
                args
            }
            Algorithm::Zopfli => {
                let mut args = flags(&["-m".into(), "-y".into()]);
                args.extend([input, output]);
                args
            }
            Algorithm::Svgo => {
                let mut args = flags(&["--multipass".into(), "-i".into()]);
                args.push(input);
                args.push("-o".into());
                args.push(output);
                args
            }
            Algorithm::Giflossy => {
                let mut args = flags(&[
                    format!("-O{GIFSICLE_LEVEL}"),
                    format!("--lossy={GIFLOSSY_LOSSINESS}"),
                    "-o".into(),
                ]);
                args.extend([output, input]);
                args
            }
            Algorithm::Gifsicle => {
                let mut args = flags(&[format!("-O{GIFSICLE_LEVEL}"), "-o".into()]);
                args.extend([output, input]);
                args
            }
        }
    }

    /// Printable command line, for logs
    pub fn command_line(&self, input: &Path, output: &Path) -> String {
        let mut line = self.program().to_string();
        for arg in self.args(input, output) {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}

/// Resolves the operation for an algorithm on a media type.
///
/// Returns `None` when the media type matches no family, the name is not a
/// known algorithm, or the algorithm belongs to a different family.
pub fn select_operation(media_type: &str, algorithm: &str) -> Option<Operation> {
    let family = MediaFamily::detect(media_type)?;
    let algorithm = Algorithm::from_str(algorithm).ok()?;
    (algorithm.family() == family).then(|| Operation::new(algorithm))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn args_of(media_type: &str, algorithm: &str) -> Vec<String> {
        let op = select_operation(media_type, algorithm).unwrap();
        op.args(Path::new("in.x"), Path::new("out.x"))
            .into_iter()
            .map(|a| a.to_string_lossy().to_string())
            .collect()
    }

    #[test]
    fn every_member_resolves_for_its_family() {
        let table: [(&str, &[&str]); 4] = [
            ("image/jpeg", &["jpegoptim", "jpegtran", "mozjpeg"]),
            ("image/png", &["advpng", "optipng", "pngcrush", "pngout", "zopfli"]),
            ("image/svg+xml", &["svgo"]),
            ("image/gif", &["giflossy", "gifsicle"]),
        ];
        for (media_type, members) in table {
            for name in members {
                let op = select_operation(media_type, name)
                    .unwrap_or_else(|| panic!("{name} should resolve for {media_type}"));
                assert_eq!(op.algorithm().name(), *name);
            }
        }
    }

    #[test]
    fn jpg_alias_maps_to_jpeg() {
        assert!(select_operation("image/jpg", "mozjpeg").is_some());
    }

    #[test]
    fn cross_family_is_rejected() {
        assert!(select_operation("image/png", "mozjpeg").is_none());
        assert!(select_operation("image/gif", "svgo").is_none());
        assert!(select_operation("image/svg+xml", "optipng").is_none());
    }

    #[test]
    fn unknown_inputs_are_rejected() {
        assert!(select_operation("image/webp", "optipng").is_none());
        assert!(select_operation("image/png", "pngquant").is_none());
        assert!(select_operation("image/png", "OptiPNG").is_none());
    }

    #[test]
    fn fixed_tuning_is_applied() {
        assert!(args_of("image/jpeg", "jpegoptim").contains(&"--max=70".to_string()));
        assert_eq!(args_of("image/jpeg", "mozjpeg")[..2], ["-quality", "70"]);
        assert!(args_of("image/png", "optipng").contains(&"-o5".to_string()));
        assert!(args_of("image/png", "advpng").contains(&"-4".to_string()));
        assert!(args_of("image/png", "pngout").contains(&"-s0".to_string()));
        assert!(args_of("image/gif", "giflossy").contains(&"--lossy=80".to_string()));
        assert!(args_of("image/gif", "gifsicle").contains(&"-O3".to_string()));
        assert!(args_of("image/svg+xml", "svgo").contains(&"--multipass".to_string()));
    }

    #[test]
    fn in_place_tools_only_see_output() {
        for name in ["jpegoptim", "advpng"] {
            let media_type = if name == "advpng" { "image/png" } else { "image/jpeg" };
            let op = select_operation(media_type, name).unwrap();
            assert_eq!(op.invocation(), Invocation::InPlace);
            let args = args_of(media_type, name);
            assert_eq!(args.last().map(String::as_str), Some("out.x"));
            assert!(!args.iter().any(|a| a == "in.x"));
        }
    }

    #[test]
    fn transform_tools_see_both_paths() {
        let op = select_operation("image/png", "zopfli").unwrap();
        assert_eq!(op.program(), "zopflipng");
        let line = op.command_line(&PathBuf::from("a.png"), &PathBuf::from(".a.tmp.png"));
        assert_eq!(line, "zopflipng -m -y a.png .a.tmp.png");
    }

    #[test]
    fn only_pngout_has_a_no_gain_exit_code() {
        assert_eq!(select_operation("image/png", "pngout").unwrap().no_gain_exit_codes(), &[2]);
        for algorithm in Algorithm::ALL.into_iter().filter(|a| *a != Algorithm::Pngout) {
            assert!(Operation::new(algorithm).no_gain_exit_codes().is_empty(), "{algorithm}");
        }
    }

    #[test]
    fn family_members_keep_table_order() {
        assert_eq!(
            family_algorithms(MediaFamily::Png),
            vec![
                Algorithm::Advpng,
                Algorithm::Optipng,
                Algorithm::Pngcrush,
                Algorithm::Pngout,
                Algorithm::Zopfli
            ]
        );
        assert_eq!(family_algorithms(MediaFamily::Svg), vec![Algorithm::Svgo]);
    }
}
