//! 验证码谜题求解 - 业务能力层
//!
//! 门户在下发验证码的同时下发一个哈希谜题（起点 sp + 目标摘要 hs），
//! 并用它派生出答案的大小写掩码，以此识别直接转发 OCR 结果的脚本。
//! 本模块只做两件事：暴力搜出谜题整数、按掩码恢复大小写。

use sha1::{Digest, Sha1};

use crate::error::{AppResult, PuzzleError};

/// 大小写掩码的模数，门户脚本里的固定常量
const MASK_MODULUS: u64 = 65533;

/// 计算 p 与挑战标识拼接后的 SHA-1 摘要（小写十六进制）
fn challenge_digest(p: u64, challenge_id: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(p.to_string().as_bytes());
    hasher.update(challenge_id.as_bytes());
    hex::encode(hasher.finalize())
}

/// 暴力搜索谜题整数
///
/// 从 `seed` 起逐一尝试，找到第一个使
/// `sha1(p 的十进制串 + challenge_id)` 等于目标摘要的 p。
/// 摘要按小写十六进制做大小写敏感比较。
///
/// 服务器实际选的距离通常很小，但没有契约上限，
/// 所以必须设迭代上限，超限报 `PuzzleUnsolvable` 而不是死循环。
pub fn solve_puzzle(
    seed: u64,
    target_digest: &str,
    challenge_id: &str,
    max_iterations: u64,
) -> AppResult<u64> {
    let mut p = seed;
    for _ in 0..max_iterations {
        if challenge_digest(p, challenge_id) == target_digest {
            return Ok(p);
        }
        p += 1;
    }
    Err(PuzzleError::CeilingExceeded {
        seed,
        max_iterations,
    }
    .into())
}

/// 按谜题整数派生的掩码恢复验证码答案的大小写
///
/// 掩码 = (solved % 65533) + 1 的二进制位串。从文本末位往前走：
/// 倒数第 i 个字符对应位串倒数第 i 位，该位为 1 取大写，
/// 为 0 或位串已耗尽取小写。字符顺序保持不变。
pub fn restore_case(raw_text: &str, solved: u64) -> String {
    let mask = (solved % MASK_MODULUS) + 1;
    let bits: Vec<u8> = format!("{:b}", mask).into_bytes();

    let chars: Vec<char> = raw_text.chars().collect();
    let total = chars.len();
    let mut result = String::with_capacity(raw_text.len());

    for (index, ch) in chars.iter().enumerate() {
        // 1-based 倒数位置
        let reverse_pos = total - index;
        let uppercase = reverse_pos <= bits.len() && bits[bits.len() - reverse_pos] == b'1';
        if uppercase {
            result.extend(ch.to_uppercase());
        } else {
            result.extend(ch.to_lowercase());
        }
    }
    result
}
