// SPDX-FileCopyrightText: 2024 Foundation Devices, Inc. <hello@foundationdevices.com>
// SPDX-License-Identifier: GPL-3.0-or-later

use {
    crate::{args::Config, keygen, protect, ExitCode},
    std::io::Write,
};


/// Generate keys into a fresh directory.
fn keygen_dir() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let output = test(["keygen", "--out-dir", dir.path().to_str().unwrap()]);
    assert_eq!(output.exit_code, ExitCode(0));
    dir
}

fn config_path(dir: &tempfile::TempDir) -> String {
    dir.path()
        .join(keygen::CONFIG_FILE)
        .to_str()
        .unwrap()
        .to_owned()
}

fn path(file: &tempfile::NamedTempFile) -> &str {
    file.path().to_str().unwrap()
}

#[test]
fn keygen_writes_consistent_key_material() {
    let dir = keygen_dir();
    let config = Config::load(&dir.path().join(keygen::CONFIG_FILE)).unwrap();

    let secret_path = config.secret.unwrap();
    assert!(secret_path.is_absolute());
    let secret = crate::args::read_secret(&secret_path).unwrap();

    let pubkey = std::fs::read(dir.path().join(keygen::PUBLIC_KEY_FILE)).unwrap();
    assert_eq!(pubkey, protect::public_key_bytes(&secret));
    assert_eq!(config.pubkey.unwrap(), hex::encode(&pubkey));
    assert_eq!(hex::decode(config.aes_key.unwrap()).unwrap().len(), 32);
    assert_eq!(hex::decode(config.iv.unwrap()).unwrap().len(), 16);
}

#[cfg(unix)]
#[test]
fn keygen_restricts_secret_files_to_owner() {
    use std::os::unix::fs::PermissionsExt;

    let dir = keygen_dir();
    for file in [keygen::SECRET_FILE, keygen::CONFIG_FILE] {
        let mode = std::fs::metadata(dir.path().join(file))
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600, "{file}");
    }
}

#[test]
fn keygen_never_overwrites_secret() {
    let dir = keygen_dir();
    let before = std::fs::read(dir.path().join(keygen::SECRET_FILE)).unwrap();
    let output = test(["keygen", "--out-dir", dir.path().to_str().unwrap()]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains(keygen::SECRET_FILE));
    assert_eq!(
        std::fs::read(dir.path().join(keygen::SECRET_FILE)).unwrap(),
        before
    );
}

/// Protect a firmware image with a generated config and dump the result.
#[test]
fn protect_then_dump() {
    let dir = keygen_dir();
    let firmware = create_file(&[0x5A; 1000]);
    let package = tempfile::NamedTempFile::new().unwrap();

    let output = test([
        "protect",
        "-c",
        &config_path(&dir),
        "-i",
        path(&firmware),
        "-o",
        path(&package),
        "--firmware-version",
        "5",
        "--message",
        "hello",
    ]);
    assert_eq!(output.exit_code, ExitCode(0));
    assert!(output.stderr.is_empty());

    // 1000 + "hello" + NUL, padded to 1008.
    let bytes = std::fs::read(package.path()).unwrap();
    assert_eq!(bytes.len(), 70 + 1008);

    let output = test(["dump", "-i", path(&package)]);
    assert_eq!(output.exit_code, ExitCode(0));
    // Prints firmware size.
    assert!(output.stdout.contains("1000 B (1000)"));
    // Prints the signature in two halves.
    assert!(output.stdout.contains(&hex::encode(&bytes[..32])));
    assert!(output.stdout.contains(&hex::encode(&bytes[32..64])));
    assert!(!output.stdout.contains("(debug)"));
}

#[test]
fn debug_version_requires_flag() {
    let dir = keygen_dir();
    let firmware = create_file(&[1; 64]);
    let package = tempfile::NamedTempFile::new().unwrap();
    let config = config_path(&dir);
    let protect = |debug: bool| {
        let mut args = vec![
            "protect",
            "-c",
            config.as_str(),
            "-i",
            path(&firmware),
            "-o",
            path(&package),
            "--firmware-version",
            "0",
        ];
        if debug {
            args.push("--debug");
        }
        main_output(args.into_iter().map(str::to_owned).collect())
    };

    let output = protect(false);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("--debug"));

    let output = protect(true);
    assert_eq!(output.exit_code, ExitCode(0));
    let output = test(["dump", "-i", path(&package)]);
    assert!(output.stdout.contains("(debug)"));

    // The update client refuses the package too, before touching the port.
    let output = test([
        "update",
        "--port",
        "/dev/does-not-exist",
        "-i",
        path(&package),
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("--debug"));
}

#[test]
fn update_checks_signature_before_opening_port() {
    let signer = keygen_dir();
    let other = keygen_dir();
    let firmware = create_file(&[7; 256]);
    let package = tempfile::NamedTempFile::new().unwrap();
    let output = test([
        "protect",
        "-c",
        &config_path(&signer),
        "-i",
        path(&firmware),
        "-o",
        path(&package),
        "--firmware-version",
        "9",
    ]);
    assert_eq!(output.exit_code, ExitCode(0));

    let other_pubkey = Config::load(&other.path().join(keygen::CONFIG_FILE))
        .unwrap()
        .pubkey
        .unwrap();
    let output = test([
        "update",
        "--port",
        "/dev/does-not-exist",
        "--pubkey",
        &other_pubkey,
        "-i",
        path(&package),
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("signature does not match"));
}

#[test]
fn secret_in_config_and_cli() {
    let dir = keygen_dir();
    let secret = dir.path().join(keygen::SECRET_FILE);
    let firmware = create_file(&[1; 16]);
    let output = test([
        "protect",
        "-c",
        &config_path(&dir),
        "--secret",
        secret.to_str().unwrap(),
        "-i",
        path(&firmware),
        "-o",
        "unused.bin",
        "--firmware-version",
        "1",
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output
        .stderr
        .contains("secret specified in both config and cli"));
}

#[test]
fn relative_secret_path_in_config() {
    let config = create_file(
        br#"
        secret = "keys/secret.pem"
        aes_key = "00"
        iv = "00"
        "#,
    );
    let firmware = create_file(&[1; 16]);
    let output = test([
        "protect",
        "-c",
        path(&config),
        "-i",
        path(&firmware),
        "-o",
        "unused.bin",
        "--firmware-version",
        "1",
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("secret key path is not absolute"));
}

#[test]
fn missing_aes_key() {
    let dir = keygen_dir();
    let secret = dir.path().join(keygen::SECRET_FILE);
    let firmware = create_file(&[1; 16]);
    let output = test([
        "protect",
        "--secret",
        secret.to_str().unwrap(),
        "--iv",
        "000102030405060708090a0b0c0d0e0f",
        "-i",
        path(&firmware),
        "-o",
        "unused.bin",
        "--firmware-version",
        "1",
    ]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("did not specify an AES key"));
}

#[test]
fn dump_truncated_package() {
    let file = create_file(&[0u8; 40]);
    let output = test(["dump", "-i", path(&file)]);
    assert_eq!(output.exit_code, ExitCode(1));
    assert!(output.stderr.contains("package too short: 40 bytes"));
}

#[test]
fn secret_pem_must_be_ec_private_key() {
    let dir = tempfile::tempdir().unwrap();
    let pem_path = dir.path().join("public.pem");
    std::fs::write(
        &pem_path,
        pem::encode(&pem::Pem::new("PUBLIC KEY", vec![0u8; 8])),
    )
    .unwrap();
    assert!(matches!(
        crate::args::read_secret(&pem_path),
        Err(crate::args::Error::InvalidPemTag(tag)) if tag == "PUBLIC KEY"
    ));
}

fn test<const N: usize>(args: [&str; N]) -> Output {
    main_output(args.iter().map(|arg| arg.to_string()).collect())
}

fn main_output(args: Vec<String>) -> Output {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    println!("* args: {:?}", args);
    let exit_code = crate::main_args(
        std::iter::once("fw-tools".to_owned()).chain(args),
        &mut stdout,
        &mut stderr,
    );
    println!("* exit_code: {:?}", exit_code);
    println!("* stdout:\n{}", String::from_utf8_lossy(&stdout));
    println!("* stderr:\n{}", String::from_utf8_lossy(&stderr));
    Output {
        exit_code,
        stdout: String::from_utf8(stdout).unwrap(),
        stderr: String::from_utf8(stderr).unwrap(),
    }
}

#[derive(Debug)]
struct Output {
    exit_code: ExitCode,
    stdout: String,
    stderr: String,
}

fn create_file(data: &[u8]) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(data).unwrap();
    file
}
