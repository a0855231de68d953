use std::ffi::OsString;
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::OnceLock;

use crate::config::Config;
use crate::data::Data;
use crate::error::{Error, Result};
use crate::io::{IoCallbacks, IoEvent};
use crate::key::KeyId;
use super::backend::{Backend, BackendHandle, SigMode, SignOptions};
use super::gpg_engine::{locate_program, query_version};
use super::pipe::{Invocation, PipeEngine};
use super::status::{StatusHandler, ColonLineHandler};


const GPGSM_PROGRAMS: [&str; 1] = ["gpgsm"];

const GPGSM_REQUIRED_VERSION: &str = "0.9.0";


/// CMS backend driving `gpgsm`.
///
/// Key editing, trust listing and signed encryption are not available
/// for CMS and keep failing with `NotImplemented`.
pub struct GpgsmBackend {
    program: Option<PathBuf>,
    file_name: Option<String>,
    homedir: Option<PathBuf>,
    version: OnceLock<Option<String>>,
}


impl GpgsmBackend {
    /// Creates a backend according to configuration.
    ///
    /// * `config` - library configuration
    pub fn new(config: &Config) -> Self {
        let program = locate_program(config.cms.file_name.as_ref(), &GPGSM_PROGRAMS);

        GpgsmBackend {
            file_name: program
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            program: program,
            homedir: config.homedir.clone(),
            version: OnceLock::new(),
        }
    }
}


impl Backend for GpgsmBackend {
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
        Some(GPGSM_REQUIRED_VERSION)
    }

    fn new_handle(&self) -> Result<Box<dyn BackendHandle>> {
        let program = self.program
            .as_deref()
            .ok_or_else(|| Error::not_implemented("gpgsm is not installed"))?;

        let mut base_args = vec![OsString::from("--enable-special-filenames")];
        if let Some(homedir) = &self.homedir {
            base_args.push("--homedir".into());
            base_args.push(homedir.into());
        }

        Ok(Box::new(GpgsmHandle { engine: PipeEngine::new(program, base_args) }))
    }
}


/// One `gpgsm` engine instance.
struct GpgsmHandle {
    engine: PipeEngine,
}


impl BackendHandle for GpgsmHandle {
    fn set_status_handler(&mut self, handler: StatusHandler) {
        self.engine
            .set_status_handler(handler)
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
        let mut invocation = Invocation::new();
        invocation.arg("--decrypt")
            .arg("--output").arg("-")
            .arg("--").arg("-")
            .stdin(ciphertext)
            .stdout(plaintext);

        self.engine.run(invocation)
    }

    fn delete(&mut self, key: &KeyId, _allow_secret: bool) -> Result<()> {
        let mut invocation = Invocation::new();
        invocation.arg("--delete-keys")
            .arg("--")
            .arg(key.as_str());

        self.engine.run(invocation)
    }

    fn encrypt(&mut self, recipients: &[KeyId], plaintext: &Data, ciphertext: &Data, armor: bool) -> Result<()> {
        if recipients.is_empty() {
            return Err(Error::not_implemented("symmetric CMS encryption"));
        }

        let mut invocation = Invocation::new();
        invocation.arg("--encrypt");
        for recipient in recipients {
            invocation.arg("-r").arg(recipient.as_str());
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

    fn export(&mut self, patterns: &[String], keydata: &Data, armor: bool) -> Result<()> {
        let mut invocation = Invocation::new();
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

    fn import(&mut self, keydata: &Data) -> Result<()> {
        let mut invocation = Invocation::new();
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
        let mut invocation = Invocation::new();
        invocation.arg("--with-colons")
            .arg(if secret_only { "--list-secret-keys" } else { "--list-keys" })
            .arg("--");

        for pattern in patterns {
            invocation.arg(pattern);
        }

        invocation.colon_lines();
        self.engine.run(invocation)
    }

    fn sign(&mut self, input: &Data, output: &Data, mode: SigMode, options: &SignOptions) -> Result<()> {
        let mut invocation = Invocation::new();
        invocation.arg(match mode {
            SigMode::Normal => "--sign",
            SigMode::Detach => "--detach-sign",
            SigMode::Clear => return Err(Error::not_implemented("CMS cleartext signatures")),
        });

        if options.armor {
            invocation.arg("--armor");
        }

        if options.include_certs >= 0 {
            invocation.arg("--include-certs")
                .arg(options.include_certs.to_string());
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

    fn verify(&mut self, signature: &Data, signed_text: Option<&Data>, plaintext: Option<&Data>) -> Result<()> {
        let mut invocation = Invocation::new();

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
                invocation.arg("--verify")
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
