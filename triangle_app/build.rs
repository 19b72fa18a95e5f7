// Compiles the triangle shaders to SPIR-V next to the build output, where the
// driver looks for them by default (<target>/Data/Engine).

use std::env;
use std::path::{Path, PathBuf};
use std::process::Command;

const SHADERS: [(&str, &str); 2] = [("sample.vert", "sample.vs.spv"), ("sample.frag", "sample.fs.spv")];

fn needs_compile(source: &Path, output: &Path) -> bool {
    match (
        std::fs::metadata(source).and_then(|m| m.modified()),
        std::fs::metadata(output).and_then(|m| m.modified()),
    ) {
        (Ok(source_time), Ok(output_time)) => source_time > output_time,
        _ => true,
    }
}

fn output_dir() -> PathBuf {
    let target = env::var("CARGO_TARGET_DIR").map_or_else(
        |_| {
            let manifest_dir = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".to_string());
            PathBuf::from(manifest_dir).join("..").join("target")
        },
        PathBuf::from,
    );
    target.join("Data").join("Engine")
}

fn main() {
    println!("cargo:rerun-if-changed=resources/shaders");
    println!("cargo:rerun-if-env-changed=VULKAN_SDK");
    println!("cargo:rerun-if-env-changed=SKIP_SHADERS");

    if env::var("SKIP_SHADERS").is_ok() {
        println!("cargo:warning=Skipping shader compilation (SKIP_SHADERS set)");
        return;
    }

    let glslc = match env::var("VULKAN_SDK") {
        Ok(sdk) if cfg!(target_os = "windows") => format!("{}\\Bin\\glslc.exe", sdk),
        Ok(sdk) => format!("{}/bin/glslc", sdk),
        Err(_) => "glslc".to_string(),
    };

    let shader_dir = PathBuf::from("resources/shaders");
    let target_dir = output_dir();
    if let Err(e) = std::fs::create_dir_all(&target_dir) {
        println!("cargo:warning=Failed to create {}: {}", target_dir.display(), e);
        return;
    }

    let mut compiled_count = 0;
    for (source_name, output_name) in SHADERS {
        let source = shader_dir.join(source_name);
        let output = target_dir.join(output_name);
        if !needs_compile(&source, &output) {
            continue;
        }

        match Command::new(&glslc).arg(&source).arg("-o").arg(&output).status() {
            Ok(status) if status.success() => compiled_count += 1,
            Ok(status) => panic!("glslc failed for {} with exit code {:?}", source.display(), status.code()),
            Err(e) => {
                println!("cargo:warning=glslc unavailable ({}); shaders not compiled", e);
                return;
            }
        }
    }

    if compiled_count > 0 {
        eprintln!("info: Compiled {} shader(s) into {}", compiled_count, target_dir.display());
    }
}
