//! Hands the generated assembly to the system assembler and linker.

use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
    process::Command,
};

use gofra::codegen::{OperatingSystem, Target};

/// Dynamic loader of x86-64 glibc systems.
const LINUX_DYNAMIC_LINKER: &str = "/lib64/ld-linux-x86-64.so.2";

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("`{program}` was not found, is it installed?")]
    Missing { program: &'static str },

    #[error("failed to run `{program}`: {source}")]
    Spawn {
        program: &'static str,
        source: io::Error,
    },

    #[error("`{program}` failed with {status}:\n{stderr}")]
    Failed {
        program: &'static str,
        status: std::process::ExitStatus,
        stderr: String,
    },
}

/// Assembles `assembly` and links it into `executable`, returning the path of
/// the intermediate object file. `libc` links the C library for programs
/// calling extern functions.
pub fn assemble_and_link(
    target: Target,
    assembly: &Path,
    executable: &Path,
    libc: bool,
) -> Result<PathBuf, Error> {
    let object = assembly.with_extension("o");

    let mut assembler = Command::new("as");
    assembler.arg("-o").arg(&object).arg(assembly);
    run("as", &mut assembler)?;

    let sdk = match target.operating_system {
        OperatingSystem::Darwin => Some(sdk_path()?),
        _ => None,
    };
    let mut linker = Command::new("ld");
    linker.args(linker_arguments(target, &object, executable, libc, sdk.as_deref()));
    run("ld", &mut linker)?;

    Ok(object)
}

/// Arguments of the `ld` invocation. Programs always start at `_start`.
fn linker_arguments(
    target: Target,
    object: &Path,
    executable: &Path,
    libc: bool,
    sdk: Option<&str>,
) -> Vec<OsString> {
    let mut args: Vec<OsString> = vec!["-o".into(), executable.into(), object.into()];
    match target.operating_system {
        // Darwin has no static system calls, libSystem is always needed.
        OperatingSystem::Darwin => {
            args.extend(["-e", "_start", "-lSystem"].map(OsString::from));
            if let Some(sdk) = sdk {
                args.extend(["-syslibroot", sdk].map(OsString::from));
            }
        }
        _ if libc => {
            args.extend(["-dynamic-linker", LINUX_DYNAMIC_LINKER, "-lc"].map(OsString::from));
        }
        _ => {}
    }
    args
}

fn sdk_path() -> Result<String, Error> {
    let mut xcrun = Command::new("xcrun");
    xcrun.args(["-sdk", "macosx", "--show-sdk-path"]);
    let output = run("xcrun", &mut xcrun)?;
    Ok(output.trim().to_owned())
}

/// Runs `command` to completion, returning its standard output.
fn run(program: &'static str, command: &mut Command) -> Result<String, Error> {
    log::debug!("running {command:?}");
    let output = command.output().map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => Error::Missing { program },
        _ => Error::Spawn { program, source },
    })?;
    if !output.status.success() {
        return Err(Error::Failed {
            program,
            status: output.status,
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        });
    }
    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
