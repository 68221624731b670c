//! Threshold secret sharing over GF(257).
//!
//! The sealing secret is split into 5 shares with threshold 3 at
//! creation time so a user can stash them with separate parties.
//! Recombination happens out of band; this module deliberately ships
//! the split only.
//!
//! 257 is the smallest prime above 256, so every byte is a field
//! element, but a share value can be 256 and needs two bytes. Share
//! wire format before base64: one index byte (1..=n) followed by two
//! little-endian bytes per secret byte.

use base64::{engine::general_purpose, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;

use fabvault_common::{Error, Result};

/// Shares produced per secret.
pub const SHARE_COUNT: u8 = 5;
/// Shares required to recombine.
pub const SHARE_THRESHOLD: u8 = 3;

const P: u16 = 257;

fn mul(a: u16, b: u16) -> u16 {
    (((a as u32) * (b as u32)) % (P as u32)) as u16
}

fn add(a: u16, b: u16) -> u16 {
    let sum = (a as u32) + (b as u32);
    if sum >= P as u32 {
        (sum - P as u32) as u16
    } else {
        sum as u16
    }
}

/// Split `secret` into `n` shares with threshold `k`.
fn split(secret: &[u8], n: u8, k: u8) -> Result<Vec<(u8, Vec<u8>)>> {
    if k < 2 {
        return Err(Error::input("share threshold must be at least 2"));
    }
    if k > n {
        return Err(Error::input("share threshold cannot exceed the share count"));
    }

    let mut rng = OsRng;
    let mut shares: Vec<Vec<u8>> = vec![Vec::with_capacity(secret.len() * 2); n as usize];

    // One degree k-1 polynomial per secret byte, constant term = the byte.
    for &byte in secret {
        let mut coeffs: Vec<u16> = Vec::with_capacity(k as usize);
        coeffs.push(byte as u16);
        for _ in 1..k {
            coeffs.push((rng.next_u32() % (P as u32)) as u16);
        }

        for xi in 1..=n {
            let x = xi as u16;
            // Horner evaluation at x.
            let mut y: u16 = 0;
            for c in coeffs.iter().rev() {
                y = mul(y, x);
                y = add(y, *c);
            }
            let share = &mut shares[(xi - 1) as usize];
            share.push(y as u8);
            share.push((y >> 8) as u8);
        }
    }

    Ok((1..=n).map(|i| (i, shares[(i - 1) as usize].clone())).collect())
}

/// Split the secret 3-of-5 and return each share base64-encoded with
/// its index byte prepended.
pub fn split_secret_base64(secret: &[u8]) -> Result<Vec<String>> {
    let shares = split(secret, SHARE_COUNT, SHARE_THRESHOLD)?;
    Ok(shares
        .into_iter()
        .map(|(index, data)| {
            let mut framed = Vec::with_capacity(1 + data.len());
            framed.push(index);
            framed.extend_from_slice(&data);
            general_purpose::STANDARD.encode(framed)
        })
        .collect())
}
