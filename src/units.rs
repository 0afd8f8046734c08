//! 人类可读金额与链上基础单位之间的无损转换
//!
//! 货币金额全程使用字符串/逐位运算,绝不经过二进制浮点数,
//! 也不依赖任何定宽数值类型,因此对位数没有上限。

/// 金额转换错误
#[derive(Debug, thiserror::Error)]
pub enum UnitError {
    #[error("无效的金额 '{0}': {1}")]
    InvalidAmount(String, String),

    #[error("无效的基础单位整数 '{0}'")]
    InvalidBaseUnits(String),
}

/// 截断策略:超出代币精度的小数位直接丢弃,绝不进位
///
/// 多付比少付危险得多,因此统一截断而非四舍五入。
pub fn truncate_to_decimals(frac: &str, decimals: u8) -> &str {
    let d = decimals as usize;
    if frac.len() > d {
        // 非 ASCII 输入可能不在字符边界上,此时保留原样,由调用方的数字校验拒绝
        frac.get(..d).unwrap_or(frac)
    } else {
        frac
    }
}

/// 按字符扫描拆分金额:返回 (整数部分, 小数部分),两部分都只含 ASCII 数字
///
/// 不经过任何定宽数值类型,因此对位数没有上限,也不存在中途舍入。
fn split_amount(human: &str) -> Result<(&str, &str), UnitError> {
    let raw = human.trim();
    if raw.starts_with('-') {
        return Err(UnitError::InvalidAmount(
            human.to_string(),
            "金额不能为负数".to_string(),
        ));
    }

    let body = raw.strip_prefix('+').unwrap_or(raw);
    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if (int_part.is_empty() && frac_part.is_empty())
        || !all_digits(int_part)
        || !all_digits(frac_part)
    {
        return Err(UnitError::InvalidAmount(
            human.to_string(),
            "不是合法的非负十进制数".to_string(),
        ));
    }

    Ok((int_part, frac_part))
}

/// 校验人类可读金额的格式与符号,不做任何转换
///
/// 用于工具入口的前置校验:在发起任何网络调用之前拒绝非法输入。
pub fn validate_human_amount(human: &str) -> Result<(), UnitError> {
    split_amount(human).map(|_| ())
}

/// 将人类可读的十进制金额转换为基础单位整数字符串
///
/// `"0.1"` 在 18 位精度下得到 `"100000000000000000"`。
/// 超出 `decimals` 的小数位按 [`truncate_to_decimals`] 截断。
/// 纯字符串拼接,任意长度的金额都逐位保留,绝不舍入。
pub fn to_base_units(human: &str, decimals: u8) -> Result<String, UnitError> {
    let (int_part, frac_part) = split_amount(human)?;
    let frac = truncate_to_decimals(frac_part, decimals);

    let padding = (decimals as usize).saturating_sub(frac.len());
    let combined = format!("{int_part}{frac}{}", "0".repeat(padding));
    let stripped = combined.trim_start_matches('0');
    Ok(if stripped.is_empty() {
        "0".to_string()
    } else {
        stripped.to_string()
    })
}

/// 将基础单位整数字符串还原为人类可读的十进制金额
///
/// 小数点插入在 `len - decimals` 处,尾部 0 被去除,整数部分至少保留一位。
pub fn to_human(base_units: &str, decimals: u8) -> Result<String, UnitError> {
    let raw = base_units.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return Err(UnitError::InvalidBaseUnits(base_units.to_string()));
    }

    let digits = raw.trim_start_matches('0');
    let digits = if digits.is_empty() { "0" } else { digits };

    if decimals == 0 {
        return Ok(digits.to_string());
    }

    let d = decimals as usize;
    // 不足 decimals+1 位时左侧补 0,保证小数点前至少有一位
    let padded = if digits.len() <= d {
        format!("{}{digits}", "0".repeat(d + 1 - digits.len()))
    } else {
        digits.to_string()
    };
    let (int_part, frac_part) = padded.split_at(padded.len() - d);

    let frac_trimmed = frac_part.trim_end_matches('0');
    Ok(if frac_trimmed.is_empty() {
        int_part.to_string()
    } else {
        format!("{int_part}.{frac_trimmed}")
    })
}
