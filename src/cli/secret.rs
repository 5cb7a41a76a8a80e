//! Secret commands: produce and inspect credential values for the config file.

use crate::cli::SecretCommands;
use crate::secrets::{mask, FieldCipher, KEY_ENV_VAR};

/// Handle `homeboard secret ...` with the key from the environment.
pub fn handle_secret(cmd: &SecretCommands) -> Result<String, Box<dyn std::error::Error>> {
    run_secret(cmd, &FieldCipher::from_env())
}

pub fn run_secret(
    cmd: &SecretCommands,
    cipher: &FieldCipher,
) -> Result<String, Box<dyn std::error::Error>> {
    match cmd {
        SecretCommands::Encrypt(args) => {
            require_key(cipher)?;
            Ok(cipher.encrypt(&args.value)?)
        }
        SecretCommands::Decrypt(args) => {
            require_key(cipher)?;
            if !FieldCipher::is_encrypted(&args.value) {
                return Err("value is not encrypted".into());
            }
            Ok(cipher.decrypt(&args.value)?)
        }
        SecretCommands::Mask(args) => Ok(mask(Some(&args.value), args.visible)),
        SecretCommands::Keygen => Ok(FieldCipher::generate_key()),
    }
}

// Without a key the cipher passes values through; here that would print plaintext.
fn require_key(cipher: &FieldCipher) -> Result<(), String> {
    if cipher.is_enabled() {
        Ok(())
    } else {
        Err(format!("{} is not set to a valid key", KEY_ENV_VAR))
    }
}
