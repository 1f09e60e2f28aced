fn main() -> anyhow::Result<()> {
    println!("cargo:rerun-if-changed=build.rs");

    #[cfg(feature = "embed")]
    embed::build_datapath()?;

    Ok(())
}

#[cfg(feature = "embed")]
mod embed {
    use std::{
        env, fs,
        io::{BufRead, BufReader},
        path::PathBuf,
        process::{Child, Command, Stdio},
        thread,
    };

    use anyhow::{Context as _, Result, anyhow};
    use cargo_metadata::{Artifact, CompilerMessage, Message, Target};

    const EBPF_PACKAGE: &str = "neigh-cache-ebpf";

    /// Compiles the datapath object for the BPF target and leaves it in
    /// `OUT_DIR` under its binary name.
    pub fn build_datapath() -> Result<()> {
        let manifest_dir =
            env::var_os("CARGO_MANIFEST_DIR").ok_or(anyhow!("CARGO_MANIFEST_DIR not set"))?;
        let root_dir = PathBuf::from(manifest_dir)
            .parent()
            .ok_or(anyhow!("neigh-cache has no parent directory"))?
            .join(EBPF_PACKAGE);
        let out_dir = PathBuf::from(env::var_os("OUT_DIR").ok_or(anyhow!("OUT_DIR not set"))?);

        let endian = env::var("CARGO_CFG_TARGET_ENDIAN").context("CARGO_CFG_TARGET_ENDIAN not set")?;
        let target = match endian.as_str() {
            "big" => "bpfeb-unknown-none",
            "little" => "bpfel-unknown-none",
            other => return Err(anyhow!("unsupported endian={other}")),
        };
        let target_arch = env::var("CARGO_CFG_TARGET_ARCH").context("CARGO_CFG_TARGET_ARCH not set")?;
        let target_arch = if target_arch.starts_with("riscv64") {
            "riscv64".to_string()
        } else {
            target_arch
        };

        println!("cargo:rerun-if-changed={}", root_dir.display());
        println!("cargo:rerun-if-changed=../neigh-cache-common/src");

        let mut cmd = Command::new("rustup");
        cmd.args(["run", "nightly", "cargo", "build"])
            .arg("--manifest-path")
            .arg(root_dir.join("Cargo.toml"))
            .args([
                "-Z",
                "build-std=core",
                "--bins",
                "--message-format=json",
                "--release",
                "--target",
                target,
            ])
            .arg("--target-dir")
            .arg(out_dir.join(EBPF_PACKAGE))
            .env(
                "CARGO_ENCODED_RUSTFLAGS",
                format!("--cfg=bpf_target_arch=\"{target_arch}\"\x1f-Cdebuginfo=2\x1f-Clink-arg=--btf"),
            );
        for key in ["RUSTC", "RUSTC_WORKSPACE_WRAPPER"] {
            cmd.env_remove(key);
        }

        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .with_context(|| format!("failed to spawn {cmd:?}"))?;
        let Child { stdout, stderr, .. } = &mut child;

        let stderr = BufReader::new(stderr.take().ok_or(anyhow!("stderr not piped"))?);
        let stderr_handle = thread::spawn(move || {
            for line in stderr.lines().map_while(Result::ok) {
                eprintln!("[ebpf] {line}");
            }
        });

        let stdout = BufReader::new(stdout.take().ok_or(anyhow!("stdout not piped"))?);
        let mut executables = Vec::new();
        for message in Message::parse_stream(stdout) {
            match message.context("invalid cargo message")? {
                Message::CompilerArtifact(Artifact {
                    executable: Some(executable),
                    target: Target { name, .. },
                    ..
                }) => executables.push((name, executable.into_std_path_buf())),
                Message::CompilerMessage(CompilerMessage { message, .. }) => {
                    for line in message.rendered.iter().flat_map(|r| r.lines()) {
                        eprintln!("[ebpf] {line}");
                    }
                }
                Message::TextLine(line) => eprintln!("[ebpf] {line}"),
                _ => {}
            }
        }

        let status = child
            .wait()
            .with_context(|| format!("failed to wait for {cmd:?}"))?;
        stderr_handle
            .join()
            .map_err(|_| anyhow!("stderr reader panicked"))?;
        if !status.success() {
            return Err(anyhow!("{cmd:?} failed: {status:?}"));
        }

        for (name, binary) in executables {
            let dst = out_dir.join(name);
            fs::copy(&binary, &dst)
                .with_context(|| format!("failed to copy {binary:?} to {dst:?}"))?;
        }

        Ok(())
    }
}
