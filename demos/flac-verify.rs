use flac_extract::{
    Error,
    decode::{Verified, verify},
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Checks each FLAC file given on the command line
///
/// Every frame's CRC-8 and CRC-16 must match,
/// every frame must decode, and the decoded audio must
/// match the MD5 sum in STREAMINFO when one is present.
/// Exits with a failure status if any file does not pass.
///
/// Files are checked in parallel with the "rayon" feature enabled.

fn main() -> ExitCode {
    let inputs: Vec<PathBuf> = std::env::args_os().skip(1).map(PathBuf::from).collect();

    let mut tally = Tally::default();
    for (path, result) in check_all(inputs) {
        tally.add(&path, result);
    }

    println!(
        "{} passed, {} without MD5, {} failed",
        tally.passed, tally.unsigned, tally.failed
    );

    match tally.failed {
        0 => ExitCode::SUCCESS,
        _ => ExitCode::FAILURE,
    }
}

fn check(path: &Path) -> Result<Verified, Error> {
    std::fs::read(path).map_err(Error::from).and_then(|data| verify(&data))
}

#[cfg(not(feature = "rayon"))]
fn check_all(inputs: Vec<PathBuf>) -> Vec<(PathBuf, Result<Verified, Error>)> {
    inputs
        .into_iter()
        .map(|path| {
            let result = check(&path);
            (path, result)
        })
        .collect()
}

#[cfg(feature = "rayon")]
fn check_all(inputs: Vec<PathBuf>) -> Vec<(PathBuf, Result<Verified, Error>)> {
    use rayon::iter::{IntoParallelIterator, ParallelIterator};

    inputs
        .into_par_iter()
        .map(|path| {
            let result = check(&path);
            (path, result)
        })
        .collect()
}

#[derive(Default)]
struct Tally {
    passed: usize,
    unsigned: usize,
    failed: usize,
}

impl Tally {
    fn add(&mut self, path: &Path, result: Result<Verified, Error>) {
        let path = path.display();

        match result {
            Ok(Verified::MD5Match) => {
                self.passed += 1;
                println!("{path}: ok");
            }
            Ok(Verified::NoMD5) => {
                self.unsigned += 1;
                println!("{path}: ok, nothing to compare MD5 against");
            }
            Ok(Verified::MD5Mismatch) => {
                self.failed += 1;
                println!("{path}: FAILED, decoded audio differs from MD5");
            }
            Err(err) => {
                self.failed += 1;
                println!("{path}: FAILED, {err}");
            }
        }
    }
}
