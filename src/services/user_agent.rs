//! User-agent classification
//!
//! Rules are tried in order and the first match wins. Chromium-based
//! browsers also advertise `Safari/`, and Edge/Opera also advertise
//! `Chrome/`, so the more specific tokens are listed first.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{DeviceInfo, DeviceType, UNKNOWN_BROWSER, UNKNOWN_OS};

struct BrowserRule {
    name: &'static str,
    pattern: Regex,
}

static BROWSER_RULES: Lazy<Vec<BrowserRule>> = Lazy::new(|| {
    let rule = |name, pattern: &str| BrowserRule {
        name,
        pattern: Regex::new(pattern).unwrap(),
    };
    vec![
        rule("Edge", r"Edg(?:e|A|iOS)?/(\d+)(?:\.(\d+))?"),
        rule("Opera", r"(?:OPR|Opera)/(\d+)(?:\.(\d+))?"),
        rule("Samsung Internet", r"SamsungBrowser/(\d+)(?:\.(\d+))?"),
        rule("Chrome", r"(?:Chrome|CriOS)/(\d+)(?:\.(\d+))?"),
        rule("Firefox", r"(?:Firefox|FxiOS)/(\d+)(?:\.(\d+))?"),
        rule("Safari", r"Version/(\d+)(?:\.(\d+))?.*Safari/"),
        rule("Internet Explorer", r"MSIE (\d+)(?:\.(\d+))?"),
        rule("Internet Explorer", r"Trident/.*rv:(\d+)(?:\.(\d+))?"),
    ]
});

static SAFARI_NO_VERSION: Lazy<Regex> = Lazy::new(|| Regex::new(r"Safari/\d+").unwrap());

static WINDOWS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Windows NT (\d+\.\d+)").unwrap());
static IOS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:iPhone|iPad|iPod).*? OS (\d+)[_.](\d+)").unwrap());
static ANDROID: Lazy<Regex> = Lazy::new(|| Regex::new(r"Android (\d+(?:\.\d+)?)").unwrap());
static MACOS: Lazy<Regex> = Lazy::new(|| Regex::new(r"Mac OS X (\d+)[_.](\d+)").unwrap());

static BOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)bot\b|crawler|spider|crawling|slurp|curl/|wget/").unwrap());
static TABLET: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)ipad|tablet|kindle|silk/|playbook").unwrap());
static MOBILE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)mobile|iphone|ipod|windows phone|blackberry|opera mini").unwrap());

/// Classify a user-agent string into browser, OS and device type
pub fn parse_user_agent(user_agent: &str) -> DeviceInfo {
    let user_agent = user_agent.trim();
    if user_agent.is_empty() {
        return DeviceInfo::default();
    }

    DeviceInfo {
        browser: detect_browser(user_agent),
        os: detect_os(user_agent),
        device_type: detect_device_type(user_agent),
    }
}

fn detect_browser(ua: &str) -> String {
    for rule in BROWSER_RULES.iter() {
        if let Some(caps) = rule.pattern.captures(ua) {
            let major = caps.get(1).map(|m| m.as_str()).unwrap_or("0");
            let minor = caps.get(2).map(|m| m.as_str()).unwrap_or("0");
            return format!("{} {}.{}", rule.name, major, minor);
        }
    }

    if SAFARI_NO_VERSION.is_match(ua) {
        return "Safari".to_string();
    }

    UNKNOWN_BROWSER.to_string()
}

fn detect_os(ua: &str) -> String {
    if let Some(caps) = WINDOWS.captures(ua) {
        let name = match &caps[1] {
            "10.0" => "Windows 10",
            "6.3" => "Windows 8.1",
            "6.2" => "Windows 8",
            "6.1" => "Windows 7",
            "6.0" => "Windows Vista",
            "5.1" | "5.2" => "Windows XP",
            _ => "Windows",
        };
        return name.to_string();
    }

    // iOS user agents contain "like Mac OS X", so check before macOS
    if let Some(caps) = IOS.captures(ua) {
        return format!("iOS {}.{}", &caps[1], &caps[2]);
    }

    // Android user agents contain "Linux"
    if let Some(caps) = ANDROID.captures(ua) {
        return format!("Android {}", &caps[1]);
    }

    if ua.contains("CrOS") {
        return "ChromeOS".to_string();
    }

    if let Some(caps) = MACOS.captures(ua) {
        return format!("macOS {}.{}", &caps[1], &caps[2]);
    }
    if ua.contains("Macintosh") {
        return "macOS".to_string();
    }

    if ua.contains("Linux") || ua.contains("X11") {
        return "Linux".to_string();
    }

    UNKNOWN_OS.to_string()
}

fn detect_device_type(ua: &str) -> DeviceType {
    if BOT.is_match(ua) {
        return DeviceType::Bot;
    }

    let android = ua.contains("Android");
    let mobile = MOBILE.is_match(ua);

    if TABLET.is_match(ua) || (android && !mobile) {
        return DeviceType::Tablet;
    }
    if mobile || android {
        return DeviceType::Mobile;
    }

    DeviceType::Desktop
}
