//! Nostr event model and canonical identity.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::keys::{self, SecretKey};
use crate::schnorr;

/// Wrapper for a Nostr tag expressed as an array of strings.
///
/// Tags appear as small arrays where the first element denotes the type and
/// the following elements hold data. Common examples include:
///
/// - `p` – references another author's public key
/// - `e` – links to another event ID
/// - `t` – free-form topic or hashtag
///
/// Each tag is stored verbatim so uncommon or custom tags are preserved. For
/// example, a `["t", "news"]` tag from the protocol is represented as
/// `Tag(vec!["t".into(), "news".into()])`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tag(pub Vec<String>);

/// Core Nostr event as published to and received from relays.
///
/// ```json
/// {
///   "id": "aa11",
///   "pubkey": "3bf0...",
///   "kind": 1,
///   "created_at": 1700000000,
///   "tags": [["t", "news"]],
///   "content": "hello",
///   "sig": "deadbeef"
/// }
/// ```
///
/// `id` and `sig` are computed from the other five fields; an event is
/// immutable once signed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Event {
    /// Event identifier (hex of SHA-256 over the canonical serialization).
    pub id: String,
    /// Author public key (hex).
    pub pubkey: String,
    /// Kind number, e.g. `1` for a short text note.
    pub kind: u32,
    /// Unix timestamp of creation.
    pub created_at: u64,
    /// Arbitrary tags such as `t` (topic) or `e` (reference).
    pub tags: Vec<Tag>,
    /// Event content body.
    pub content: String,
    /// Schnorr signature over the event hash.
    pub sig: String,
}

/// The unsigned fields of an event, before identity is attached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventDraft {
    /// Kind number; `1` publishes a plain note.
    #[serde(default = "default_kind")]
    pub kind: u32,
    /// Unix timestamp; fill with the current time for fresh events.
    #[serde(default)]
    pub created_at: u64,
    /// Tags carried verbatim into the signed event.
    #[serde(default)]
    pub tags: Vec<Tag>,
    /// Content body.
    #[serde(default)]
    pub content: String,
}

fn default_kind() -> u32 {
    1
}

/// Compute the canonical event hash.
///
/// The digest covers the JSON encoding of `[0, pubkey, created_at, kind,
/// tags, content]` — the leading `0` and the field order are both
/// load-bearing for interoperability. `serde_json` leaves forward slashes
/// and non-ASCII text unescaped, which is the required encoding.
pub fn event_hash(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<[u8; 32]> {
    let arr = serde_json::json!([0, pubkey, created_at, kind, tags, content]);
    let data = serde_json::to_vec(&arr)
        .map_err(|e| Error::Format(format!("canonical serialization failed: {e}")))?;
    Ok(Sha256::digest(&data).into())
}

/// Compute an event id as 64-char lowercase hex.
pub fn compute_id(
    pubkey: &str,
    created_at: u64,
    kind: u32,
    tags: &[Tag],
    content: &str,
) -> Result<String> {
    Ok(hex::encode(event_hash(pubkey, created_at, kind, tags, content)?))
}

/// Sign a draft with an `nsec` identifier, producing a complete event.
///
/// Decodes the secret, derives the x-only author key, fills in `pubkey` and
/// `id`, and signs the id. The first failure along that chain propagates.
pub fn sign_draft(draft: &EventDraft, nsec: &str) -> Result<Event> {
    let secret = SecretKey::from_nsec(nsec)?;
    sign_draft_with_key(draft, &secret)
}

/// Sign a draft with an already-decoded secret key.
pub fn sign_draft_with_key(draft: &EventDraft, secret: &SecretKey) -> Result<Event> {
    let pubkey = hex::encode(secret.x_only_public_key()?);
    let hash = event_hash(
        &pubkey,
        draft.created_at,
        draft.kind,
        &draft.tags,
        &draft.content,
    )?;
    let sig = schnorr::sign(&hash, secret.as_bytes())?;
    Ok(Event {
        id: hex::encode(hash),
        pubkey,
        kind: draft.kind,
        created_at: draft.created_at,
        tags: draft.tags.clone(),
        content: draft.content.clone(),
        sig: hex::encode(sig),
    })
}

/// Verify an event's id and Schnorr signature.
///
/// The id is recomputed from the claimed fields and compared first; a
/// mismatch fails before any signature work. The author key may be raw hex
/// or an `npub` identifier.
pub fn verify_event(ev: &Event) -> Result<()> {
    let hash = event_hash(&ev.pubkey, ev.created_at, ev.kind, &ev.tags, &ev.content)?;
    if hex::encode(hash) != ev.id.to_lowercase() {
        return Err(Error::Signature("event id does not match payload".into()));
    }

    let pubkey_hex = keys::normalize_pubkey(&ev.pubkey)?;
    let pubkey: [u8; 32] = hex::decode(&pubkey_hex)
        .map_err(|e| Error::Format(format!("invalid author key hex: {e}")))?
        .try_into()
        .map_err(|_| Error::Format("author key is not 32 bytes".into()))?;

    let sig_bytes = hex::decode(ev.sig.trim())
        .map_err(|e| Error::Format(format!("invalid signature hex: {e}")))?;
    let sig: [u8; 64] = sig_bytes
        .try_into()
        .map_err(|_| Error::Format("signature is not 64 bytes".into()))?;

    if !schnorr::verify(&sig, &hash, &pubkey) {
        return Err(Error::Signature("signature check failed".into()));
    }
    Ok(())
}

/// Build tag arrays from `(name, value)` pairs, one tag per value.
pub fn tags_from_pairs<'a, I>(pairs: I) -> Vec<Tag>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    pairs
        .into_iter()
        .map(|(name, value)| Tag(vec![name.to_string(), value.to_string()]))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const NSEC: &str = "nsec1vl029mgpspedva04g90vltkh6fvh240zqtv9k0t9af8935ke9laqsnlfe5";

    fn sample_draft() -> EventDraft {
        EventDraft {
            kind: 1,
            created_at: 1_700_000_000,
            tags: vec![Tag(vec!["t".into(), "news".into()])],
            content: "hello".into(),
        }
    }

    #[test]
    fn event_hash_matches_reference() {
        let pubkey = "00".repeat(32);
        let expected = {
            let obj = serde_json::json!([0, pubkey, 1, 1, Vec::<Tag>::new(), ""]);
            let digest = Sha256::digest(serde_json::to_vec(&obj).unwrap());
            let mut arr = [0u8; 32];
            arr.copy_from_slice(&digest);
            arr
        };
        assert_eq!(event_hash(&pubkey, 1, 1, &[], "").unwrap(), expected);
    }

    #[test]
    fn canonical_form_leaves_slashes_and_unicode_alone() {
        let arr = serde_json::json!([0, "aa", 1, 1, Vec::<Tag>::new(), "https://example.com/π"]);
        let text = serde_json::to_string(&arr).unwrap();
        assert!(text.contains("https://example.com/π"));
        let direct: [u8; 32] = Sha256::digest(text.as_bytes()).into();
        assert_eq!(
            event_hash("aa", 1, 1, &[], "https://example.com/π").unwrap(),
            direct
        );
    }

    #[test]
    fn sign_then_verify() {
        let ev = sign_draft(&sample_draft(), NSEC).unwrap();
        assert_eq!(ev.id.len(), 64);
        assert_eq!(ev.sig.len(), 128);
        verify_event(&ev).unwrap();
    }

    #[test]
    fn id_binding_rejects_mutated_content() {
        let mut ev = sign_draft(&sample_draft(), NSEC).unwrap();
        ev.content.push('!');
        let err = verify_event(&ev).unwrap_err();
        assert!(err.to_string().contains("id does not match"));
    }

    #[test]
    fn id_binding_rejects_mutated_timestamp() {
        let mut ev = sign_draft(&sample_draft(), NSEC).unwrap();
        ev.created_at += 1;
        let err = verify_event(&ev).unwrap_err();
        assert!(err.to_string().contains("id does not match"));
    }

    #[test]
    fn resigning_same_fields_keeps_the_id() {
        let a = sign_draft(&sample_draft(), NSEC).unwrap();
        let b = sign_draft(&sample_draft(), NSEC).unwrap();
        // Randomized nonces give distinct signatures over the same id.
        assert_eq!(a.id, b.id);
    }

    #[test]
    fn verify_accepts_npub_author() {
        let base = sign_draft(&sample_draft(), NSEC).unwrap();
        // An event whose claimed author is the npub form: the id must be
        // computed over that exact string for the event to be internally
        // consistent.
        let npub = crate::keys::hex_to_npub(&base.pubkey).unwrap();
        let hash = event_hash(&npub, base.created_at, base.kind, &base.tags, &base.content).unwrap();
        let secret = SecretKey::from_nsec(NSEC).unwrap();
        let sig = schnorr::sign(&hash, secret.as_bytes()).unwrap();
        let ev = Event {
            id: hex::encode(hash),
            pubkey: npub,
            kind: base.kind,
            created_at: base.created_at,
            tags: base.tags.clone(),
            content: base.content.clone(),
            sig: hex::encode(sig),
        };
        verify_event(&ev).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_signature() {
        let mut ev = sign_draft(&sample_draft(), NSEC).unwrap();
        let flipped = if &ev.sig[0..1] == "0" { "1" } else { "0" };
        ev.sig.replace_range(0..1, flipped);
        assert!(verify_event(&ev).is_err());
    }

    #[test]
    fn wire_shape_round_trips_through_json() {
        let ev = sign_draft(&sample_draft(), NSEC).unwrap();
        let text = serde_json::to_string(&ev).unwrap();
        let back: Event = serde_json::from_str(&text).unwrap();
        assert_eq!(ev, back);
    }

    #[test]
    fn tags_from_pairs_builds_one_tag_per_value() {
        let tags = tags_from_pairs([("t", "news"), ("t", "essay")]);
        assert_eq!(
            tags,
            vec![
                Tag(vec!["t".into(), "news".into()]),
                Tag(vec!["t".into(), "essay".into()])
            ]
        );
    }
}
