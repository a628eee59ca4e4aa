use anyhow::{Result, bail};
use std::io::{self, IsTerminal};
use zeroize::Zeroizing;

pub const SECRET_ENV: &str = "CREDSEAL_SECRET";

/// Reads the secret to hash or verify.
pub fn read_secret() -> Result<Zeroizing<String>> {
    //  Environment Variable
    //  CREDSEAL_SECRET="hunter2" credseal hash
    if let Ok(secret) = std::env::var(SECRET_ENV) {
        if !secret.is_empty() {
            return Ok(Zeroizing::new(secret));
        }
    }

    //  stdin (Pipeline)
    //  printf "%s" "$PW" | credseal verify '$argon2$...'
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_line(&mut buf)?;
        trim_newline(&mut buf);

        if !buf.is_empty() {
            return Ok(buf);
        }
    }

    //  Interactive (TTY)
    if io::stdin().is_terminal() {
        let secret = Zeroizing::new(rpassword::prompt_password("Secret: ")?);
        if !secret.is_empty() {
            return Ok(secret);
        }
    }

    bail!("no secret provided")
}

fn trim_newline(s: &mut String) {
    while s.ends_with('\n') || s.ends_with('\r') {
        s.pop();
    }
}
