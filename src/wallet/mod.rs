use rand::rngs::OsRng;
use secp256k1::{Message, PublicKey, Secp256k1, SecretKey, ecdsa::Signature};
use serde::Serialize;

use crate::crypto::{address_from_pubkey, sha256};
use crate::transaction::{Address, Transaction};

/// Decides whether a non-system transaction carries an acceptable signature.
pub trait SignaturePolicy: Send + Sync {
    fn accepts(&self, tx: &Transaction) -> bool;
}

/// Accepts any non-empty signature. No cryptographic verification happens at
/// the ledger; swap in a real policy to get it.
#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceOnly;

impl SignaturePolicy for PresenceOnly {
    fn accepts(&self, tx: &Transaction) -> bool {
        tx.has_signature()
    }
}

/// A user's identity: secp256k1 keypair plus derived address.
#[derive(Clone)]
pub struct Wallet {
    secret: SecretKey,
    public: PublicKey,
    address: Address,
}

/// Public part of a wallet, safe to show.
#[derive(Debug, Clone, Serialize)]
pub struct WalletInfo {
    pub address: String,
    pub public_key: String,
}

impl Wallet {
    /// Generate a fresh keypair.
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret, public) = secp.generate_keypair(&mut OsRng);
        Self::from_keys(secret, public)
    }

    /// Restore a wallet from a hex-encoded secret key.
    pub fn from_secret_hex(secret_hex: &str) -> Result<Self, &'static str> {
        let bytes = hex::decode(secret_hex).map_err(|_| "invalid secret key hex")?;
        let secret = SecretKey::from_slice(&bytes).map_err(|_| "invalid secret key bytes")?;
        let public = PublicKey::from_secret_key(&Secp256k1::new(), &secret);
        Ok(Self::from_keys(secret, public))
    }

    fn from_keys(secret: SecretKey, public: PublicKey) -> Self {
        let address = Address::new(address_from_pubkey(&public.serialize()));
        Self {
            secret,
            public,
            address,
        }
    }

    pub fn address(&self) -> &Address {
        &self.address
    }

    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public.serialize())
    }

    pub fn secret_key_hex(&self) -> String {
        hex::encode(self.secret.secret_bytes())
    }

    pub fn info(&self) -> WalletInfo {
        WalletInfo {
            address: self.address.to_string(),
            public_key: self.public_key_hex(),
        }
    }

    /// Sign the transaction's canonical payload (hex DER ECDSA).
    /// System transactions are left untouched.
    pub fn sign(&self, tx: &mut Transaction) {
        if tx.is_system() {
            return;
        }
        let secp = Secp256k1::signing_only();
        let msg = Message::from_digest(sha256(&tx.signing_payload()));
        let sig = secp.sign_ecdsa(&msg, &self.secret);
        tx.signature = Some(hex::encode(sig.serialize_der()));
    }

    /// Check a signature produced by this wallet.
    pub fn verify(&self, tx: &Transaction) -> bool {
        verify_signature_hex(&self.public_key_hex(), tx).unwrap_or(false)
    }
}

/// Verify a transaction's signature (hex DER) against a hex compressed pubkey.
pub fn verify_signature_hex(pubkey_hex: &str, tx: &Transaction) -> Result<bool, &'static str> {
    let secp = Secp256k1::verification_only();

    let sig_hex = tx.signature.as_deref().ok_or("missing signature")?;
    let sig_bytes = hex::decode(sig_hex).map_err(|_| "invalid signature hex")?;
    let sig = Signature::from_der(&sig_bytes).map_err(|_| "invalid DER signature")?;

    let pk_bytes = hex::decode(pubkey_hex).map_err(|_| "invalid pubkey hex")?;
    let pk = PublicKey::from_slice(&pk_bytes).map_err(|_| "invalid pubkey bytes")?;

    let msg = Message::from_digest(sha256(&tx.signing_payload()));
    Ok(secp.verify_ecdsa(&msg, &sig, &pk).is_ok())
}
