//! Build script for `ptg`.
//!
//! Embeds the build date, target triple and rustc version for `ptg --version`.
//! Every step is best effort: a missing git checkout or toolchain query only
//! drops the corresponding line from the version output.

use vergen_gix::{BuildBuilder, CargoBuilder, Emitter, RustcBuilder};

fn warn(what: &str, err: impl std::fmt::Display) {
    println!("cargo:warning=vergen {what} failed: {err}");
}

fn main() {
    let mut emitter = Emitter::default();

    match BuildBuilder::default().build_timestamp(true).build() {
        Ok(build) => {
            if let Err(e) = emitter.add_instructions(&build) {
                warn("build instructions", e);
            }
        }
        Err(e) => warn("build metadata", e),
    }

    match CargoBuilder::default().target_triple(true).build() {
        Ok(cargo) => {
            if let Err(e) = emitter.add_instructions(&cargo) {
                warn("cargo instructions", e);
            }
        }
        Err(e) => warn("cargo metadata", e),
    }

    match RustcBuilder::default().semver(true).build() {
        Ok(rustc) => {
            if let Err(e) = emitter.add_instructions(&rustc) {
                warn("rustc instructions", e);
            }
        }
        Err(e) => warn("rustc metadata", e),
    }

    if let Err(e) = emitter.emit() {
        warn("emit", e);
    }
}
