use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;
use std::sync::OnceLock;

use crate::config::{self, Config};
use crate::data::Data;
use crate::error::{Error, Result};
use crate::io::{IoCallbacks, IoEvent};
use crate::key::KeyId;
use super::backend::{Backend, BackendHandle, SigMode, SignOptions};
use super::pipe::{Invocation, PipeEngine};
use super::status::{StatusHandler, CommandHandler, ColonLineHandler};
use super::version::{compare_versions, version_from_banner};


/// Program names tried in `PATH`, in order of preference.
const GPG_PROGRAMS: [&str; 2] = ["gpg", "gpg2"];

/// Oldest `gpg` speaking the status protocol we parse.
const GPG_REQUIRED_VERSION: &str = "1.2.2";

/// First `gpg` that needs loopback pinentry to take passphrases on the command channel.
const LOOPBACK_PINENTRY_VERSION: &str = "2.1.0";


/// Runs `program --version` and extracts the version.
///
/// * `program` - backend program
pub(super) fn query_version(program: &Path) -> Option<String> {
    let output = Command::new(program)
        .arg("--version")
        .stdin(Stdio::null())
        .stderr(Stdio::null())
        .output()
        .map_err(|err| tracing::warn!(program = %program.display(), error = %err, "cannot query backend version"))
        .ok()?;

    version_from_banner(&String::from_utf8_lossy(&output.stdout))
}


/// Resolves the program from configuration or `PATH`.
///
/// * `configured` - explicit path from configuration
/// * `names` - program names to search for
pub(super) fn locate_program(configured: Option<&PathBuf>, names: &[&str]) -> Option<PathBuf> {
    match configured {
        Some(path) => path.is_file().then(|| path.clone()),
        None => config::find_program(names),
    }
}


/// OpenPGP backend driving `gpg`.
pub struct GpgBackend {
    program: Option<PathBuf>,
    file_name: Option<String>,
    homedir: Option<PathBuf>,

    /// Queried on first use
    version: OnceLock<Option<String>>,
}


impl GpgBackend {
    /// Creates a backend according to configuration.
    ///
    /// * `config` - library configuration
    pub fn new(config: &Config) -> Self {
        let program = locate_program(config.openpgp.file_name.as_ref(), &GPG_PROGRAMS);

        GpgBackend {
            file_name: program
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            program: program,
            homedir: config.homedir.clone(),
            version: OnceLock::new(),
        }
    }
}


impl Backend for GpgBackend {
    fn file_name(&self) -> Option<&str> {
        self.file_name
            .as_deref()
    }

    fn version(&self) -> Option<&str> {
        self.version
            .get_or_init(|| self.program.as_deref().and_then(query_version))
            .as_deref()
    }

    fn required_version(&self) -> Option<&str> {
        Some(GPG_REQUIRED_VERSION)
    }

    fn new_handle(&self) -> Result<Box<dyn BackendHandle>> {
        let program = self.program
            .as_deref()
            .ok_or_else(|| Error::not_implemented("gpg is not installed"))?;

        let mut base_args: Vec<OsString> = [
            "--no-tty",
            "--charset", "utf8",
            "--enable-progress-filter",
            "--enable-special-filenames",
        ].iter().map(OsString::from).collect();

        if let Some(homedir) = &self.homedir {
            base_args.push("--homedir".into());
            base_args.push(homedir.into());
        }

        Ok(Box::new(GpgHandle {
            engine: PipeEngine::new(program, base_args),
            loopback: compare_versions(self.version(), Some(LOOPBACK_PINENTRY_VERSION)),
        }))
    }
}


/// One `gpg` engine instance.
struct GpgHandle {
    engine: PipeEngine,

    /// Passphrases go through the command channel only in loopback mode
    loopback: bool,
}


impl GpgHandle {
    fn invocation(&self) -> Invocation {
        let mut invocation = Invocation::new();
        if self.loopback && self.engine.has_command_handler() {
            invocation.arg("--pinentry-mode")
                .arg("loopback");
        }

        invocation
    }
}


impl BackendHandle for GpgHandle {
    fn set_status_handler(&mut self, handler: StatusHandler) {
        self.engine
            .set_status_handler(handler)
    }

    fn set_command_handler(&mut self, handler: CommandHandler) -> Result<()> {
        self.engine.set_command_handler(handler);
        Ok(())
    }

    fn set_colon_line_handler(&mut self, handler: ColonLineHandler) -> Result<()> {
        self.engine.set_colon_line_handler(handler);
        Ok(())
    }

    fn set_io_callbacks(&mut self, io: Rc<dyn IoCallbacks>) {
        self.engine
            .set_io_callbacks(io)
    }

    fn io_event(&mut self, event: &IoEvent) {
        self.engine
            .io_event(event)
    }

    fn decrypt(&mut self, ciphertext: &Data, plaintext: &Data) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg("--decrypt")
            .arg("--output").arg("-")
            .arg("--").arg("-")
            .stdin(ciphertext)
            .stdout(plaintext);

        self.engine.run(invocation)
    }

    fn delete(&mut self, key: &KeyId, allow_secret: bool) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg("--yes")
            .arg(if allow_secret { "--delete-secret-and-public-key" } else { "--delete-key" })
            .arg("--")
            .arg(key.as_str());

        self.engine.run(invocation)
    }

    fn edit(&mut self, key: &KeyId, out: &Data) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg("--edit-key")
            .arg("--")
            .arg(key.as_str())
            .stdout(out);

        self.engine.run(invocation)
    }

    fn encrypt(&mut self, recipients: &[KeyId], plaintext: &Data, ciphertext: &Data, armor: bool) -> Result<()> {
        let mut invocation = self.invocation();
        if recipients.is_empty() {
            invocation.arg("--symmetric");
        } else {
            invocation.arg("--encrypt");
            for recipient in recipients {
                invocation.arg("-r").arg(recipient.as_str());
            }
        }

        if armor {
            invocation.arg("--armor");
        }

        invocation.arg("--output").arg("-")
            .arg("--").arg("-")
            .stdin(plaintext)
            .stdout(ciphertext);

        self.engine.run(invocation)
    }

    fn encrypt_sign(&mut self, recipients: &[KeyId], plaintext: &Data, ciphertext: &Data,
        options: &SignOptions) -> Result<()>
    {
        if recipients.is_empty() {
            return Err(Error::invalid_value("Signed encryption needs recipients"));
        }

        let mut invocation = self.invocation();
        invocation.arg("--encrypt").arg("--sign");
        for recipient in recipients {
            invocation.arg("-r").arg(recipient.as_str());
        }

        for signer in &options.signers {
            invocation.arg("-u").arg(signer.as_str());
        }

        if options.armor {
            invocation.arg("--armor");
        }

        invocation.arg("--output").arg("-")
            .arg("--").arg("-")
            .stdin(plaintext)
            .stdout(ciphertext);

        self.engine.run(invocation)
    }

    fn export(&mut self, patterns: &[String], keydata: &Data, armor: bool) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg("--export");
        if armor {
            invocation.arg("--armor");
        }

        invocation.arg("--");
        for pattern in patterns {
            invocation.arg(pattern);
        }

        invocation.stdout(keydata);
        self.engine.run(invocation)
    }

    fn genkey(&mut self, params: &Data, armor: bool, pubkey: Option<&Data>, seckey: Option<&Data>) -> Result<()> {
        //
        // Generated keys always land in the keyring
        //

        if pubkey.is_some() || seckey.is_some() {
            return Err(Error::not_implemented("genkey into data"));
        }

        let mut invocation = self.invocation();
        invocation.arg("--gen-key");
        if armor {
            invocation.arg("--armor");
        }

        invocation.stdin(params);
        self.engine.run(invocation)
    }

    fn import(&mut self, keydata: &Data) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg("--import")
            .stdin(keydata);

        self.engine.run(invocation)
    }

    fn keylist(&mut self, pattern: Option<&str>, secret_only: bool) -> Result<()> {
        let patterns: Vec<String> = pattern
            .into_iter()
            .map(str::to_owned)
            .collect();

        self.keylist_ext(&patterns, secret_only)
    }

    fn keylist_ext(&mut self, patterns: &[String], secret_only: bool) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg("--with-colons")
            .arg("--fixed-list-mode")
            .arg("--with-fingerprint")
            .arg(if secret_only { "--list-secret-keys" } else { "--list-keys" })
            .arg("--");

        for pattern in patterns {
            invocation.arg(pattern);
        }

        invocation.colon_lines();
        self.engine.run(invocation)
    }

    fn sign(&mut self, input: &Data, output: &Data, mode: SigMode, options: &SignOptions) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg(match mode {
            SigMode::Normal => "--sign",
            SigMode::Detach => "--detach-sign",
            SigMode::Clear => "--clearsign",
        });

        if options.armor && mode != SigMode::Clear {
            invocation.arg("--armor");
        }

        if options.textmode {
            invocation.arg("--textmode");
        }

        for signer in &options.signers {
            invocation.arg("-u").arg(signer.as_str());
        }

        invocation.arg("--output").arg("-")
            .arg("--").arg("-")
            .stdin(input)
            .stdout(output);

        self.engine.run(invocation)
    }

    fn trustlist(&mut self, pattern: &str) -> Result<()> {
        let mut invocation = self.invocation();
        invocation.arg("--with-colons")
            .arg("--list-trust-path")
            .arg("--")
            .arg(pattern)
            .colon_lines();

        self.engine.run(invocation)
    }

    fn verify(&mut self, signature: &Data, signed_text: Option<&Data>, plaintext: Option<&Data>) -> Result<()> {
        let mut invocation = self.invocation();

        match signed_text {
            Some(text) => {
                let sig_name = invocation.extra_input(signature)?;
                invocation.arg("--verify")
                    .arg("--")
                    .arg(sig_name)
                    .arg("-")
                    .stdin(text);
            }

            None => {
                invocation.arg("--decrypt")
                    .arg("--output").arg("-")
                    .arg("--").arg("-")
                    .stdin(signature);

                if let Some(plaintext) = plaintext {
                    invocation.stdout(plaintext);
                }
            }
        }

        self.engine.run(invocation)
    }
}
