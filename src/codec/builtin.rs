//! Codec sets registered at startup

use crate::codec::key::{ContextField, KeyStrategy};
use crate::codec::registry::{CodecRegistry, CodecRegistryBuilder};
use crate::codec::strategy::Codec;
use crate::codec::transform::Transform;

pub const VIDSRC: &str = "vidsrc";

/// Player that derives its key in WASM from canvas/timestamp fingerprints
pub const WASM_PLAYER: &str = "wasm-player";

const SXNL_KEY: &str = "pWB9V)[*4I`nJpp?ozyB~dbr9yt!_n4u";
const UX8Q_KEY: &str = "X9a(O;FMV2-7VO5x;Ao\u{0005}:dN1NoFs?j,";
const KJHI_KEY: &str = r#"3SAY~#%Y(V%>5d/Yg"$G[Lh1rK4a;7ok"#;

fn literal(key: &str) -> KeyStrategy {
    KeyStrategy::Literal {
        key: key.to_string(),
    }
}

fn div_id_key() -> KeyStrategy {
    KeyStrategy::StaticContext {
        field: ContextField::DivId,
        normalize: false,
        last_n: None,
        length: None,
    }
}

fn reversed_b64_shift(id: &str, div_id: &str, n: i16) -> Codec {
    Codec::new(
        id,
        KeyStrategy::None,
        vec![
            Transform::Reverse,
            Transform::UrlSafeBase64Decode,
            Transform::ModShift { n },
        ],
    )
    .for_div_ids(&[div_id])
}

/// Div-id-keyed schemes seen on vidsrc terminal pages, most specific first
pub fn vidsrc_codecs() -> Vec<(i32, Codec)> {
    vec![
        (
            10,
            Codec::new("vidsrc-plain", KeyStrategy::None, Vec::new())
                .for_div_ids(&["NdonQLf1Tzyx7bMG"]),
        ),
        (
            10,
            Codec::new(
                "vidsrc-hex-xor-shift-b64",
                literal(SXNL_KEY),
                vec![
                    Transform::HexPairDecode,
                    Transform::XorRepeat,
                    Transform::ModShift { n: -3 },
                    Transform::Base64Decode,
                ],
            )
            .for_div_ids(&["sXnL9MQIry"]),
        ),
        (
            10,
            Codec::new(
                "vidsrc-rot13-b64",
                KeyStrategy::None,
                vec![Transform::Rot13, Transform::Base64Decode],
            )
            .for_div_ids(&["IhWrImMIGL"]),
        ),
        (
            10,
            Codec::new(
                "vidsrc-even-b64",
                KeyStrategy::None,
                vec![
                    Transform::EveryNth { step: 2, offset: 0 },
                    Transform::Base64Decode,
                ],
            )
            .for_div_ids(&["xTyBxQyGTA"]),
        ),
        (
            10,
            Codec::new(
                "vidsrc-hex-xor-b64",
                literal(UX8Q_KEY),
                vec![
                    Transform::HexPairDecode,
                    Transform::XorRepeat,
                    Transform::Base64Decode,
                ],
            )
            .for_div_ids(&["ux8qjPHC66"]),
        ),
        (
            10,
            Codec::new(
                "vidsrc-reverse-shift-hex",
                KeyStrategy::None,
                vec![
                    Transform::Reverse,
                    Transform::ModShift { n: -1 },
                    Transform::HexPairDecode,
                ],
            )
            .for_div_ids(&["eSfH1IRMyL"]),
        ),
        (
            10,
            Codec::new(
                "vidsrc-slice-b64-xor",
                literal(KJHI_KEY),
                vec![
                    Transform::Slice { front: 10, back: 16 },
                    Transform::Base64Decode,
                    Transform::XorRepeat,
                ],
            )
            .for_div_ids(&["KJHidj7det"]),
        ),
        (
            10,
            Codec::new(
                "vidsrc-caesar",
                KeyStrategy::None,
                vec![Transform::CaesarShift { n: -1 }],
            )
            .for_div_ids(&["o2VSUnjnZl"]),
        ),
        (10, reversed_b64_shift("vidsrc-rb64-shift5", "Oi3v1dAlaM", -5)),
        (10, reversed_b64_shift("vidsrc-rb64-shift7", "TsA2KGDGux", -7)),
        (10, reversed_b64_shift("vidsrc-rb64-shift3", "JoAHUMCLXV", -3)),
        // Competing hypotheses for ids without a confirmed scheme (and for
        // rotated schemes behind known ids). Both stay registered; the
        // validator decides at runtime.
        (
            50,
            Codec::new(
                "vidsrc-divid-xor",
                div_id_key(),
                vec![
                    Transform::UrlSafeBase64Decode,
                    Transform::XorRepeat,
                    Transform::Reverse,
                ],
            ),
        ),
        (
            51,
            Codec::new(
                "vidsrc-divid-feedback",
                div_id_key(),
                vec![Transform::HexPairDecode, Transform::XorFeedback],
            ),
        ),
    ]
}

/// Placeholder for fingerprint-keyed players: always fails until the key
/// formula is confirmed against the real player.
pub fn wasm_player_codecs() -> Vec<(i32, Codec)> {
    vec![(
        10,
        Codec::new(
            "wasm-player-fingerprint",
            KeyStrategy::Unconfirmed {
                reason: "client-side key derived from canvas hash and timestamp".to_string(),
            },
            vec![Transform::UrlSafeBase64Decode, Transform::XorRepeat],
        ),
    )]
}

/// Add every built-in codec set to `builder`
pub fn register_builtin(mut builder: CodecRegistryBuilder) -> CodecRegistryBuilder {
    for (priority, codec) in vidsrc_codecs() {
        builder = builder.register(VIDSRC, priority, codec);
    }
    for (priority, codec) in wasm_player_codecs() {
        builder = builder.register(WASM_PLAYER, priority, codec);
    }
    builder
}

impl CodecRegistry {
    /// Registry holding only the built-in codec sets
    pub fn builtin() -> Self {
        register_builtin(Self::builder()).build()
    }
}
