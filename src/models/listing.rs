use serde::Serialize;

/// 一条广告记录，对应输出表格中的一行
///
/// 字段顺序即 CSV 表头顺序。
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ListingRecord {
    pub ad_id: String,
    pub url: String,
    pub title: String,
    #[serde(rename = "createdAt")]
    pub created_at: String,
    pub price: String,
    pub price_currency: String,

    // --- 卖家 ---
    pub seller_type: String,
    pub user_id: String,
    pub seller_name: String,
    pub seller_since: String,
    pub seller_since2: String,
    pub phone_number: String,

    // --- 位置 ---
    pub city: String,
    pub region: String,
    /// 列表数据中有 `location.subregion` 时填写，否则为空
    pub subregion: String,
    pub lon: String,
    pub lat: String,

    // --- 车辆参数 ---
    pub brand: String,
    pub model: String,
    pub version: String,
    pub generation: String,
    pub year: String,
    pub mileage: String,
    pub engine_capacity: String,
    pub engine_power: String,
    pub fuel_type: String,
    pub gearbox: String,
    pub transmission: String,
    pub body_type: String,
    pub door_count: String,
    pub nr_seats: String,
    pub color: String,
    pub country_origin: String,
    pub new_used: String,
    pub no_accident: String,
    pub has_vin: String,
    pub is_imported_car: String,
    pub has_registration: String,
    pub service_record: String,
    pub damaged: String,
    pub co2_emissions: String,
    pub urban_consumption: String,
    pub extra_urban_consumption: String,

    // --- 抓取信息 ---
    pub page_number: String,
    pub current_date: String,
}

impl ListingRecord {
    /// 按参数键写入车辆参数，未知键返回 false
    pub fn set_param(&mut self, key: &str, value: String) -> bool {
        let slot = match key {
            "make" => &mut self.brand,
            "model" => &mut self.model,
            "version" => &mut self.version,
            "generation" => &mut self.generation,
            "year" => &mut self.year,
            "mileage" => &mut self.mileage,
            "engine_capacity" => &mut self.engine_capacity,
            "engine_power" => &mut self.engine_power,
            "fuel_type" => &mut self.fuel_type,
            "gearbox" => &mut self.gearbox,
            "transmission" => &mut self.transmission,
            "body_type" => &mut self.body_type,
            "door_count" => &mut self.door_count,
            "nr_seats" => &mut self.nr_seats,
            "color" => &mut self.color,
            "country_origin" => &mut self.country_origin,
            "new_used" => &mut self.new_used,
            "no_accident" => &mut self.no_accident,
            "has_vin" => &mut self.has_vin,
            "is_imported_car" => &mut self.is_imported_car,
            "has_registration" => &mut self.has_registration,
            "service_record" => &mut self.service_record,
            "damaged" => &mut self.damaged,
            "co2_emissions" => &mut self.co2_emissions,
            "urban_consumption" => &mut self.urban_consumption,
            "extra_urban_consumption" => &mut self.extra_urban_consumption,
            _ => return false,
        };
        *slot = value;
        true
    }
}
