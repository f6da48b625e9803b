//! User-Agent classification
//!
//! `woothee` supplies browser/OS names and versions; a coarse substring scan
//! fills in the family when it cannot. Device names come from the raw string.

use serde::Serialize;

use crate::models::{UNKNOWN, UNKNOWN_DEVICE};

/// woothee's marker for a value it could not determine
const WOOTHEE_UNKNOWN: &str = "UNKNOWN";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    /// Desktops and anything else that is not a handheld
    Desktop,
}

impl DeviceClass {
    pub fn is_handheld(self) -> bool {
        matches!(self, DeviceClass::Mobile | DeviceClass::Tablet)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserAgentInfo {
    /// "{name} {version}", or just the name
    pub browser: String,
    /// "{name} {version}", or just the name
    pub os: String,
    pub device_class: DeviceClass,
    pub device: String,
}

impl UserAgentInfo {
    pub fn unknown() -> Self {
        Self {
            browser: UNKNOWN.to_string(),
            os: UNKNOWN.to_string(),
            device_class: DeviceClass::Desktop,
            device: UNKNOWN_DEVICE.to_string(),
        }
    }
}

/// Classify a raw `User-Agent` header value. Never fails; an empty or
/// unrecognisable string yields the "Unknown" defaults.
pub fn classify(user_agent: &str) -> UserAgentInfo {
    let user_agent = user_agent.trim();
    if user_agent.is_empty() {
        return UserAgentInfo::unknown();
    }

    let parsed = woothee::parser::Parser::new().parse(user_agent);

    let (browser, os, category) = match parsed {
        Some(ref result) => {
            let browser = known(&result.name).map(|name| label(name, known(&result.version)));
            let os = known(&result.os).map(|name| {
                // woothee puts the version in the name for Windows ("Windows 10")
                // and reports the NT kernel as the version
                if name.starts_with("Windows") {
                    name.to_string()
                } else {
                    label(name, known(&result.os_version))
                }
            });
            (browser, os, result.category)
        }
        None => (None, None, WOOTHEE_UNKNOWN),
    };

    let browser = browser
        .or_else(|| coarse_browser_family(user_agent).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string());
    let os = os
        .or_else(|| coarse_os_family(user_agent).map(str::to_string))
        .unwrap_or_else(|| UNKNOWN.to_string());

    let device_class = device_class(user_agent, category);
    let device = device_name(user_agent, device_class);

    UserAgentInfo {
        browser,
        os,
        device_class,
        device,
    }
}

fn known(value: &str) -> Option<&str> {
    let value = value.trim();
    if value.is_empty() || value == WOOTHEE_UNKNOWN {
        None
    } else {
        Some(value)
    }
}

fn label(name: &str, version: Option<&str>) -> String {
    match version {
        Some(version) => format!("{} {}", name, version),
        None => name.to_string(),
    }
}

/// Family-only browser detection for agents woothee does not know
pub fn coarse_browser_family(user_agent: &str) -> Option<&'static str> {
    const FAMILIES: &[(&str, &str)] = &[
        ("Edg/", "Edge"),
        ("Edge/", "Edge"),
        ("OPR/", "Opera"),
        ("Opera", "Opera"),
        ("SamsungBrowser", "Samsung Internet"),
        ("Firefox/", "Firefox"),
        ("FxiOS/", "Firefox"),
        ("CriOS/", "Chrome"),
        ("Chrome/", "Chrome"),
        ("Safari/", "Safari"),
        ("Trident/", "Internet Explorer"),
        ("MSIE", "Internet Explorer"),
        ("curl/", "curl"),
        ("Wget/", "Wget"),
        ("PostmanRuntime", "Postman"),
        ("python-requests", "Python Requests"),
    ];

    FAMILIES
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map(|(_, family)| *family)
}

/// Family-only OS detection for agents woothee does not know
pub fn coarse_os_family(user_agent: &str) -> Option<&'static str> {
    const FAMILIES: &[(&str, &str)] = &[
        ("Windows", "Windows"),
        ("Android", "Android"),
        ("iPhone", "iOS"),
        ("iPad", "iOS"),
        ("iPod", "iOS"),
        ("CrOS", "Chrome OS"),
        ("Mac OS X", "Mac OS X"),
        ("Macintosh", "Mac OS X"),
        ("Linux", "Linux"),
    ];

    FAMILIES
        .iter()
        .find(|(marker, _)| user_agent.contains(marker))
        .map(|(_, family)| *family)
}

fn device_class(user_agent: &str, category: &str) -> DeviceClass {
    if user_agent.contains("iPad") || user_agent.contains("Tablet") {
        return DeviceClass::Tablet;
    }
    // Android tablets omit the "Mobile" token
    if user_agent.contains("Android") && !user_agent.contains("Mobile") {
        return DeviceClass::Tablet;
    }
    if matches!(category, "smartphone" | "mobilephone")
        || user_agent.contains("iPhone")
        || user_agent.contains("iPod")
        || user_agent.contains("Mobile")
    {
        return DeviceClass::Mobile;
    }
    DeviceClass::Desktop
}

fn device_name(user_agent: &str, class: DeviceClass) -> String {
    if class.is_handheld() {
        let (vendor, model) = handheld_vendor_model(user_agent);
        return format!("{} {}", vendor.unwrap_or("Mobile"), model.unwrap_or_default())
            .trim()
            .to_string();
    }

    if user_agent.contains("Macintosh") {
        "Mac".to_string()
    } else if user_agent.contains("Windows") {
        "Windows PC".to_string()
    } else if user_agent.contains("Linux") {
        "Linux PC".to_string()
    } else {
        "Desktop".to_string()
    }
}

fn handheld_vendor_model(user_agent: &str) -> (Option<&'static str>, Option<String>) {
    for (marker, model) in [("iPhone", "iPhone"), ("iPad", "iPad"), ("iPod", "iPod touch")] {
        if user_agent.contains(marker) {
            return (Some("Apple"), Some(model.to_string()));
        }
    }

    let Some(model) = android_model(user_agent) else {
        return (None, None);
    };

    match android_vendor(model) {
        Some((vendor, prefix_len)) => {
            let model = model[prefix_len..].trim();
            let model = if model.is_empty() { None } else { Some(model.to_string()) };
            (Some(vendor), model)
        }
        None => (None, Some(model.to_string())),
    }
}

/// Model token from an Android agent, e.g. `Pixel 8` from
/// `(Linux; Android 14; Pixel 8 Build/UQ1A.240105.004; wv)`
fn android_model(user_agent: &str) -> Option<&str> {
    let start = user_agent.find('(')?;
    let end = user_agent[start..].find(')')? + start;
    let platform = &user_agent[start + 1..end];

    let mut segments = platform.split(';').map(str::trim);
    segments.find(|s| s.starts_with("Android"))?;

    segments
        .map(|s| s.split(" Build/").next().unwrap_or(s).trim())
        .find(|s| !is_platform_filler(s))
}

fn is_platform_filler(segment: &str) -> bool {
    // "K" is the frozen model of reduced Chrome agents
    if segment.is_empty() || segment == "K" || segment == "wv" || segment == "U" {
        return true;
    }
    // locale tokens such as "en-us"
    let bytes = segment.as_bytes();
    bytes.len() == 5 && bytes[2] == b'-' && segment.chars().all(|c| c.is_ascii_alphabetic() || c == '-')
}

/// Vendor for an Android model token, with the length of any vendor prefix
/// repeated in the token ("SAMSUNG SM-G991B")
fn android_vendor(model: &str) -> Option<(&'static str, usize)> {
    const NAMED: &[(&str, &str)] = &[
        ("samsung", "Samsung"),
        ("huawei", "Huawei"),
        ("xiaomi", "Xiaomi"),
        ("oneplus", "OnePlus"),
        ("motorola", "Motorola"),
        ("nokia", "Nokia"),
        ("oppo", "OPPO"),
        ("vivo", "vivo"),
        ("lenovo", "Lenovo"),
        ("sony", "Sony"),
        ("htc", "HTC"),
        ("lg", "LG"),
    ];
    const MODEL_PREFIXES: &[(&str, &str)] = &[
        ("SM-", "Samsung"),
        ("GT-", "Samsung"),
        ("Pixel", "Google"),
        ("Nexus", "Google"),
        ("Redmi", "Xiaomi"),
        ("Mi ", "Xiaomi"),
        ("POCO", "Xiaomi"),
        ("moto", "Motorola"),
        ("Moto", "Motorola"),
        ("LM-", "LG"),
        ("CPH", "OPPO"),
        ("RMX", "realme"),
        ("ELE-", "Huawei"),
        ("VOG-", "Huawei"),
    ];

    let lower = model.to_ascii_lowercase();
    for (name, vendor) in NAMED {
        if let Some(rest) = lower.strip_prefix(name) {
            // only a prefix when followed by a separator ("LG-H870", "HTC One")
            if rest.starts_with([' ', '-', '_']) {
                return Some((*vendor, name.len() + 1));
            }
        }
    }

    MODEL_PREFIXES
        .iter()
        .find(|(prefix, _)| model.starts_with(prefix))
        .map(|(_, vendor)| (*vendor, 0))
}
