//! 页面解析服务 - 业务能力层
//!
//! 只负责"从 HTML / JSON 中提取数据"能力，不发请求、不关心流程

use std::collections::HashSet;
use std::sync::LazyLock;

use phf::phf_map;
use regex::Regex;
use reqwest::Url;
use scraper::{Html, Selector};
use serde_json::Value as JsonValue;

use crate::error::{AppResult, HarvestError};
use crate::models::ListingRecord;

/// 车辆参数取值方式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    /// 取 `values[0].value`
    Value,
    /// 取 `values[0].label`
    Label,
}

impl ParamKind {
    fn field(self) -> &'static str {
        match self {
            ParamKind::Value => "value",
            ParamKind::Label => "label",
        }
    }
}

/// `parametersDict` 中需要提取的参数
pub static VEHICLE_PARAMS: phf::Map<&'static str, ParamKind> = phf_map! {
    "year" => ParamKind::Value,
    "mileage" => ParamKind::Value,
    "engine_capacity" => ParamKind::Value,
    "engine_power" => ParamKind::Value,
    "door_count" => ParamKind::Value,
    "nr_seats" => ParamKind::Value,
    "has_vin" => ParamKind::Value,
    "is_imported_car" => ParamKind::Value,
    "has_registration" => ParamKind::Value,
    "no_accident" => ParamKind::Value,
    "service_record" => ParamKind::Value,
    "damaged" => ParamKind::Value,
    "co2_emissions" => ParamKind::Value,
    "extra_urban_consumption" => ParamKind::Value,
    "urban_consumption" => ParamKind::Value,
    "make" => ParamKind::Label,
    "model" => ParamKind::Label,
    "version" => ParamKind::Label,
    "generation" => ParamKind::Label,
    "fuel_type" => ParamKind::Label,
    "gearbox" => ParamKind::Label,
    "transmission" => ParamKind::Label,
    "body_type" => ParamKind::Label,
    "color" => ParamKind::Label,
    "country_origin" => ParamKind::Label,
    "new_used" => ParamKind::Label,
};

/// 没有电话号码时写入的值
pub const NO_PHONE: &str = "no_phone";

fn selector(css: &str) -> AppResult<Selector> {
    Selector::parse(css).map_err(|e| HarvestError::Parse(format!("选择器 {}: {}", css, e)))
}

/// 提取列表页中的广告链接
///
/// 只保留包含 `pattern` 的链接，相对地址按 `page_url` 解析，同一页内去重并保持顺序。
pub fn extract_ad_links(html: &str, page_url: &str, pattern: &str) -> AppResult<Vec<String>> {
    let document = Html::parse_document(html);
    let anchors = selector("a[href]")?;
    let base = Url::parse(page_url).ok();

    let mut seen = HashSet::new();
    let mut links = Vec::new();
    for anchor in document.select(&anchors) {
        let Some(href) = anchor.value().attr("href") else {
            continue;
        };
        if !href.contains(pattern) {
            continue;
        }
        let absolute = match &base {
            Some(base) => base
                .join(href)
                .map(|u| u.to_string())
                .unwrap_or_else(|_| href.to_string()),
            None => href.to_string(),
        };
        if seen.insert(absolute.clone()) {
            links.push(absolute);
        }
    }
    Ok(links)
}

/// 提取广告详情页中的 advert 对象
///
/// 页面里没有包含 `pageProps` 的脚本时返回 None。
pub fn extract_advert(html: &str) -> AppResult<Option<JsonValue>> {
    let document = Html::parse_document(html);
    let scripts = selector("script")?;

    let Some(script) = document
        .select(&scripts)
        .map(|s| s.text().collect::<String>())
        .find(|text| text.contains("pageProps"))
    else {
        return Ok(None);
    };

    let mut payload = script.trim();
    if let Some(rest) = payload.strip_prefix("data = (") {
        payload = rest;
    }
    if let Some(rest) = payload.strip_suffix(");") {
        payload = rest;
    }

    let data: JsonValue = serde_json::from_str(payload)?;
    let advert = if data.get("props").is_some() {
        data.pointer("/props/pageProps/advert")
    } else {
        data.pointer("/pageProps/advert")
    };

    Ok(Some(
        advert
            .cloned()
            .unwrap_or_else(|| JsonValue::Object(Default::default())),
    ))
}

/// 由 advert 对象构建一条记录
pub fn build_record(
    advert: &JsonValue,
    page_number: u32,
    page_url: &str,
    current_date: &str,
) -> ListingRecord {
    let seller = advert.get("seller");
    let location = seller.and_then(|s| s.get("location"));
    let map = location.and_then(|l| l.get("map"));
    let price = advert.get("price");
    let badges = seller.and_then(|s| s.get("featuresBadges"));

    let mut record = ListingRecord {
        ad_id: text(advert.get("id")),
        url: advert
            .get("url")
            .map(|v| text(Some(v)))
            .unwrap_or_else(|| page_url.to_string()),
        title: text(advert.get("title")),
        created_at: text(advert.get("createdAt")),
        price: text(price.and_then(|p| p.get("value"))),
        price_currency: text(price.and_then(|p| p.get("currency"))),
        seller_type: text(seller.and_then(|s| s.get("type"))),
        user_id: text(seller.and_then(|s| s.get("id"))),
        seller_name: text(seller.and_then(|s| s.get("name"))),
        seller_since: text(badges.and_then(|b| b.get(1))),
        seller_since2: text(badges.and_then(|b| b.get(2))),
        city: text(location.and_then(|l| l.get("city"))),
        region: text(location.and_then(|l| l.get("region"))),
        subregion: text(location.and_then(|l| l.get("subregion"))),
        lon: text(map.and_then(|m| m.get("longitude"))),
        lat: text(map.and_then(|m| m.get("latitude"))),
        page_number: page_number.to_string(),
        current_date: current_date.to_string(),
        ..Default::default()
    };

    let params = advert.get("parametersDict");
    for (key, kind) in VEHICLE_PARAMS.entries() {
        let value = params
            .and_then(|p| p.get(*key))
            .and_then(|p| p.get("values"))
            .and_then(|values| values.get(0))
            .and_then(|first| first.get(kind.field()));
        record.set_param(key, text(value));
    }

    record
}

/// 解析电话接口的响应，失败时返回 `no_phone`
pub fn parse_phone(body: &str) -> String {
    let Ok(data) = serde_json::from_str::<JsonValue>(body) else {
        return NO_PHONE.to_string();
    };
    match data.get("value") {
        None => NO_PHONE.to_string(),
        Some(JsonValue::String(raw)) => strip_paragraph_tags(raw),
        Some(other) => text(Some(other)),
    }
}

/// 电话号码外层的 `<p>` 标签
static PARAGRAPH_TAGS: LazyLock<Result<Regex, regex::Error>> =
    LazyLock::new(|| Regex::new(r"(?i)</?p\s*>"));

fn strip_paragraph_tags(raw: &str) -> String {
    match PARAGRAPH_TAGS.as_ref() {
        Ok(re) => re.replace_all(raw, "").trim().to_string(),
        Err(_) => raw.trim().to_string(),
    }
}

/// JSON 值转为单元格文本，缺失或 null 为空串
fn text(value: Option<&JsonValue>) -> String {
    match value {
        None | Some(JsonValue::Null) => String::new(),
        Some(JsonValue::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
