//! 列表页处理上下文
//!
//! 封装"我正在处理第几页、页面地址是什么"这一信息

use std::fmt::Display;

/// 列表页上下文
#[derive(Debug, Clone)]
pub struct PageCtx {
    /// 页码
    pub page_number: u32,

    /// 列表页地址
    pub url: String,
}

impl PageCtx {
    /// 根据列表地址和页码创建上下文
    pub fn new(listing_url: &str, page_number: u32) -> Self {
        let separator = if listing_url.contains('?') { '&' } else { '?' };
        Self {
            page_number,
            url: format!("{}{}page={}", listing_url, separator, page_number),
        }
    }
}

impl Display for PageCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[第 {} 页]", self.page_number)
    }
}
