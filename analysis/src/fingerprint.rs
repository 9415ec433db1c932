//! クエリ文字列から決定的なスコア用ハッシュを計算する
//!
//! 疑似スコアはすべてこの値から導出される。同じクエリには
//! プロセスやコールドスタートをまたいでも同じレポートを返すこと。

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/// 文字列の FNV-1a ハッシュ値
pub fn fingerprint(input: &str) -> u64 {
    input.bytes().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(FNV_PRIME)
    })
}

/// `fingerprint(input) % modulus` を計算する
///
/// `modulus` が 0 の場合は 0 を返す。
pub fn bucket(input: &str, modulus: u64) -> u64 {
    if modulus == 0 {
        return 0;
    }
    fingerprint(input) % modulus
}

/// 小数点以下 `digits` 桁に丸める
pub fn round_to(value: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (value * factor).round() / factor
}
