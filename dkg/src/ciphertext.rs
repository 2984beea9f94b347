//! Encryption to the key of a key generation epoch.
//!
//! # Scheme
//!
//! To encrypt `message` with associated data `aad` to the public key `pk = g^s`:
//! 1. Sample `r` and compute the commitment `U = g^r`.
//! 2. Derive the shared secret `e(pk^r, h)` and hash it into a ChaCha20-Poly1305 key.
//! 3. Encrypt `message` under that key (nonce derived from `U`) authenticating `aad`.
//! 4. Hash the body and compute the authentication tag `W = H(U || SHA-256(body) || aad)^r`.
//!
//! Anybody can check that `U` and `W` share the same `r` (and that the ciphertext
//! was bound to `aad`) with `e(U, H) · e(-g, W) == 1`. Validators only produce
//! decryption shares for ciphertexts that pass this check.

use crate::{
    decryption::SharedSecret,
    primitives::group::{pairing, pairing_product_is_one, Element, Scalar, G1, G2},
    Error, MAX_MESSAGE_SIZE,
};
use bytes::{Buf, BufMut};
use chacha20poly1305::{
    aead::{generic_array::typenum::Unsigned, Aead, Payload},
    AeadCore, ChaCha20Poly1305, KeyInit as _,
};
use commonware_codec::{
    Decode, Encode, EncodeSize, Error as CodecError, FixedSize, RangeCfg, Read, ReadExt, Write,
};
use commonware_utils::union;
use rand_core::CryptoRngCore;
use sha2::{Digest as _, Sha256};
use tracing::warn;
use zeroize::Zeroize;

/// Domain separation tag for hashing to G2 when binding a ciphertext.
pub const AUTH_TAG_DST: &[u8] = b"THRESHOLD_DKG_BLS12381G2_XMD:SHA-256_SSWU_RO_CIPHERTEXT_";

/// Label prepended to the shared secret when deriving the symmetric key.
const KDF_LABEL: &[u8] = b"THRESHOLD_DKG_SESSION_KEY";

/// Label prepended to the commitment when deriving the nonce.
const NONCE_LABEL: &[u8] = b"THRESHOLD_DKG_NONCE";

/// Length of the body hash.
const DIGEST_LENGTH: usize = 32;

/// The amount of overhead in a ciphertext body, compared to the plain message.
pub const CIPHERTEXT_OVERHEAD: usize = <ChaCha20Poly1305 as AeadCore>::TagSize::USIZE;

/// How many bytes are in a nonce.
const NONCE_SIZE_BYTES: usize = <ChaCha20Poly1305 as AeadCore>::NonceSize::USIZE;

/// The public key of a key generation epoch (`g^s` in G1).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DkgPublicKey(G1);

impl DkgPublicKey {
    /// Returns the underlying group element.
    pub fn as_point(&self) -> &G1 {
        &self.0
    }

    /// Serializes the public key.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes a public key.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &())?)
    }
}

impl From<G1> for DkgPublicKey {
    fn from(point: G1) -> Self {
        Self(point)
    }
}

impl Write for DkgPublicKey {
    fn write(&self, buf: &mut impl BufMut) {
        self.0.write(buf);
    }
}

impl Read for DkgPublicKey {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        Ok(Self(G1::read(buf)?))
    }
}

impl FixedSize for DkgPublicKey {
    const SIZE: usize = G1::SIZE;
}

/// Returns `-g`, used to check ciphertext headers with a single pairing product.
fn g1_inv() -> G1 {
    let mut g1_inv = G1::one();
    g1_inv.neg();
    g1_inv
}

/// Non-secret parameters of a key generation epoch required to decrypt.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DkgPublicParameters {
    tau: u64,
    shares_num: u32,
    security_threshold: u32,
    g1_inv: G1,
}

impl DkgPublicParameters {
    pub(crate) fn new(tau: u64, shares_num: u32, security_threshold: u32) -> Self {
        Self {
            tau,
            shares_num,
            security_threshold,
            g1_inv: g1_inv(),
        }
    }

    /// Returns the epoch.
    pub fn tau(&self) -> u64 {
        self.tau
    }

    /// Returns the number of shares dealt (the size of the registry).
    pub fn shares_num(&self) -> u32 {
        self.shares_num
    }

    /// Returns the number of decryption shares required to decrypt.
    pub fn security_threshold(&self) -> u32 {
        self.security_threshold
    }

    /// Returns `-g`.
    pub fn g1_inv(&self) -> &G1 {
        &self.g1_inv
    }

    /// Serializes the parameters.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes the parameters.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &())?)
    }
}

impl Write for DkgPublicParameters {
    fn write(&self, buf: &mut impl BufMut) {
        self.tau.write(buf);
        self.shares_num.write(buf);
        self.security_threshold.write(buf);
        self.g1_inv.write(buf);
    }
}

impl Read for DkgPublicParameters {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let tau = u64::read(buf)?;
        let shares_num = u32::read(buf)?;
        let security_threshold = u32::read(buf)?;
        let g1_inv = G1::read(buf)?;
        if security_threshold == 0 || security_threshold > shares_num {
            return Err(CodecError::Invalid("DkgPublicParameters", "invalid threshold"));
        }
        if g1_inv != self::g1_inv() {
            return Err(CodecError::Invalid("DkgPublicParameters", "invalid g1_inv"));
        }
        Ok(Self {
            tau,
            shares_num,
            security_threshold,
            g1_inv,
        })
    }
}

impl FixedSize for DkgPublicParameters {
    const SIZE: usize = u64::SIZE + u32::SIZE + u32::SIZE + G1::SIZE;
}

/// The public-key component of a [Ciphertext].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CiphertextHeader {
    commitment: G1,
    auth_tag: G2,
    body_hash: [u8; DIGEST_LENGTH],
}

impl CiphertextHeader {
    /// Returns `U = g^r`.
    pub fn commitment(&self) -> &G1 {
        &self.commitment
    }

    /// Returns `W = H(U || body_hash || aad)^r`.
    pub fn auth_tag(&self) -> &G2 {
        &self.auth_tag
    }

    /// Returns the SHA-256 digest of the ciphertext body.
    pub fn body_hash(&self) -> &[u8; DIGEST_LENGTH] {
        &self.body_hash
    }

    /// Checks that the header was created for `aad`: `e(U, H) · e(g1_inv, W) == 1`.
    pub fn check(&self, aad: &[u8], g1_inv: &G1) -> bool {
        let h = auth_base(&self.commitment, &self.body_hash, aad);
        pairing_product_is_one(&[(self.commitment, h), (*g1_inv, self.auth_tag)])
    }

    /// Serializes the header.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes a header.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &())?)
    }
}

impl Write for CiphertextHeader {
    fn write(&self, buf: &mut impl BufMut) {
        self.commitment.write(buf);
        self.auth_tag.write(buf);
        self.body_hash.write(buf);
    }
}

impl Read for CiphertextHeader {
    type Cfg = ();

    fn read_cfg(buf: &mut impl Buf, _: &()) -> Result<Self, CodecError> {
        let commitment = G1::read(buf)?;
        let auth_tag = G2::read(buf)?;
        let body_hash = <[u8; DIGEST_LENGTH]>::read(buf)?;
        Ok(Self {
            commitment,
            auth_tag,
            body_hash,
        })
    }
}

impl FixedSize for CiphertextHeader {
    const SIZE: usize = G1::SIZE + G2::SIZE + DIGEST_LENGTH;
}

/// A message encrypted to a [DkgPublicKey].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ciphertext {
    header: CiphertextHeader,
    body: Vec<u8>,
}

impl Ciphertext {
    /// Returns the header validators create decryption shares for.
    pub fn header(&self) -> &CiphertextHeader {
        &self.header
    }

    /// Returns the encrypted message (including the AEAD tag).
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Checks that the body matches the header and that the header was created for `aad`.
    pub fn check(&self, aad: &[u8], g1_inv: &G1) -> Result<(), Error> {
        if digest(&self.body) != self.header.body_hash {
            return Err(Error::AuthenticationFailure);
        }
        if !self.header.check(aad, g1_inv) {
            return Err(Error::AadMismatch);
        }
        Ok(())
    }

    /// Serializes the ciphertext.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.encode().to_vec()
    }

    /// Deserializes a ciphertext with a body of at most [MAX_MESSAGE_SIZE] (plus overhead) bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        Ok(Self::decode_cfg(bytes, &(MAX_MESSAGE_SIZE + CIPHERTEXT_OVERHEAD))?)
    }
}

impl Write for Ciphertext {
    fn write(&self, buf: &mut impl BufMut) {
        self.header.write(buf);
        self.body.write(buf);
    }
}

impl Read for Ciphertext {
    /// The maximum length of the body.
    type Cfg = usize;

    fn read_cfg(buf: &mut impl Buf, max: &usize) -> Result<Self, CodecError> {
        let header = CiphertextHeader::read(buf)?;
        let range = RangeCfg::from(CIPHERTEXT_OVERHEAD..=*max);
        let body = Vec::<u8>::read_cfg(buf, &(range, ()))?;
        Ok(Self { header, body })
    }
}

impl EncodeSize for Ciphertext {
    fn encode_size(&self) -> usize {
        CiphertextHeader::SIZE + self.body.encode_size()
    }
}

fn digest(data: &[u8]) -> [u8; DIGEST_LENGTH] {
    Sha256::digest(data).into()
}

/// Hashes the public binding data of a ciphertext to G2.
fn auth_base(commitment: &G1, body_hash: &[u8; DIGEST_LENGTH], aad: &[u8]) -> G2 {
    let message = union(&union(&commitment.encode(), body_hash), aad);
    G2::hash(AUTH_TAG_DST, &message)
}

/// Derives the ChaCha20-Poly1305 key from the shared secret.
fn session_key(secret: &SharedSecret) -> ChaCha20Poly1305 {
    let mut hasher = Sha256::new();
    hasher.update(KDF_LABEL);
    hasher.update(secret.encode());
    let mut key: [u8; DIGEST_LENGTH] = hasher.finalize().into();
    let cipher = ChaCha20Poly1305::new(&key.into());
    key.zeroize();
    cipher
}

/// Derives the nonce from the (fresh) ciphertext commitment.
fn nonce(commitment: &G1) -> [u8; NONCE_SIZE_BYTES] {
    let mut hasher = Sha256::new();
    hasher.update(NONCE_LABEL);
    hasher.update(commitment.encode());
    let digest: [u8; DIGEST_LENGTH] = hasher.finalize().into();
    let mut nonce = [0u8; NONCE_SIZE_BYTES];
    nonce.copy_from_slice(&digest[..NONCE_SIZE_BYTES]);
    nonce
}

/// Encrypts `message` to `public_key`, binding it to `aad`.
pub fn encrypt<R: CryptoRngCore>(
    message: &[u8],
    aad: &[u8],
    public_key: &DkgPublicKey,
    rng: &mut R,
) -> Result<Ciphertext, Error> {
    if message.len() > MAX_MESSAGE_SIZE {
        return Err(Error::InvalidParameters("message too large"));
    }
    if public_key.0.is_identity() {
        return Err(Error::InvalidParameters("identity public key"));
    }
    let mut r = Scalar::rand_nonzero(rng);

    // U = g^r
    let mut commitment = G1::one();
    commitment.mul(&r);

    // e(pk^r, h)
    let mut blinded = public_key.0;
    blinded.mul(&r);
    let secret = SharedSecret::from(pairing(&blinded, &G2::one()));

    // Encrypt the message
    let body = session_key(&secret)
        .encrypt(
            (&nonce(&commitment)[..]).into(),
            Payload { msg: message, aad },
        )
        .map_err(|_| Error::InvalidParameters("encryption failed"))?;
    let body_hash = digest(&body);

    // W = H(U || body_hash || aad)^r
    let mut auth_tag = auth_base(&commitment, &body_hash, aad);
    auth_tag.mul(&r);
    r.zeroize();

    Ok(Ciphertext {
        header: CiphertextHeader {
            commitment,
            auth_tag,
            body_hash,
        },
        body,
    })
}

/// Decrypts `ciphertext` with the secret combined from decryption shares.
///
/// Fails without returning any plaintext if the ciphertext was not bound to
/// `aad` or if it (or the secret) has been tampered with.
pub fn decrypt_with_shared_secret(
    ciphertext: &Ciphertext,
    aad: &[u8],
    shared_secret: &SharedSecret,
    public_params: &DkgPublicParameters,
) -> Result<Vec<u8>, Error> {
    if public_params.g1_inv != g1_inv() {
        return Err(Error::InvalidParameters("invalid g1_inv"));
    }
    ciphertext
        .check(aad, &public_params.g1_inv)
        .inspect_err(|err| warn!(?err, "rejected ciphertext"))?;
    session_key(shared_secret)
        .decrypt(
            (&nonce(&ciphertext.header.commitment)[..]).into(),
            Payload {
                msg: &ciphertext.body,
                aad,
            },
        )
        .map_err(|_| Error::AuthenticationFailure)
}
