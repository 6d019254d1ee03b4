//! 元素定位器模型
//!
//! 把"如何找到页面元素"描述为一个封闭的标签联合，
//! 每个变体通过一次穷举匹配编译为唯一的引擎查询（CSS 或 XPath）。
//! 编译是纯函数，不触碰页面；等待可见性等属性由调用方负责。

use std::fmt;

use thiserror::Error;

/// 定位器规格错误（程序性错误，构造时即可发现，永不重试）
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LocatorError {
    /// 必填字段为空
    #[error("定位器的 {what} 为空")]
    Empty { what: &'static str },
}

/// 元素定位器规格
///
/// 不可变：构造一次，之后只读。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorSpec {
    /// CSS 选择器
    Css(String),
    /// XPath 表达式
    XPath(String),
    /// 按 label 文本定位表单控件
    Label(String),
    /// 按 placeholder 属性定位
    Placeholder(String),
    /// 按元素自身文本定位
    Text(String),
    /// 按 data-testid 属性定位
    TestId(String),
    /// 按 ARIA 角色定位，可选按可见名称过滤
    Role {
        role: String,
        name: Option<String>,
    },
}

/// 编译后的引擎查询
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    Css(String),
    XPath(String),
}

impl LocatorSpec {
    /// 从字符串形式解析定位器
    ///
    /// 支持 `css=` / `xpath=` 前缀；以 `//` 或 `(` 开头视为 XPath；
    /// 其余视为 CSS 选择器。
    pub fn parse(raw: &str) -> Result<Self, LocatorError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LocatorError::Empty {
                what: "选择器字符串",
            });
        }
        if let Some(rest) = trimmed.strip_prefix("css=") {
            return Ok(LocatorSpec::Css(rest.to_string()));
        }
        if let Some(rest) = trimmed.strip_prefix("xpath=") {
            return Ok(LocatorSpec::XPath(rest.to_string()));
        }
        if trimmed.starts_with("//") || trimmed.starts_with('(') {
            return Ok(LocatorSpec::XPath(trimmed.to_string()));
        }
        Ok(LocatorSpec::Css(trimmed.to_string()))
    }

    /// 编译为引擎查询
    ///
    /// # 返回
    /// 每个规格对应且仅对应一条查询；必填字段为空时返回 `LocatorError`
    pub fn to_query(&self) -> Result<Query, LocatorError> {
        match self {
            LocatorSpec::Css(selector) => {
                require(selector, "css 选择器")?;
                Ok(Query::Css(selector.clone()))
            }
            LocatorSpec::XPath(expr) => {
                require(expr, "xpath 表达式")?;
                Ok(Query::XPath(expr.clone()))
            }
            LocatorSpec::Label(text) => {
                require(text, "label 文本")?;
                let lit = xpath_literal(text);
                // 兼容两种写法：label[for=id] 指向的控件，以及嵌在 label 里的控件
                Ok(Query::XPath(format!(
                    "//*[@id = //label[normalize-space(.) = {lit}]/@for] \
                     | //label[normalize-space(.) = {lit}]//*[self::input or self::textarea or self::select]",
                )))
            }
            LocatorSpec::Placeholder(text) => {
                require(text, "placeholder 文本")?;
                let lit = xpath_literal(text);
                Ok(Query::XPath(format!("//*[@placeholder = {lit}]")))
            }
            LocatorSpec::Text(text) => {
                require(text, "元素文本")?;
                let lit = xpath_literal(text);
                // 只匹配自身直接持有该文本节点的元素，避免命中外层容器
                Ok(Query::XPath(format!(
                    "//*[text()[normalize-space(.) = {lit}]]"
                )))
            }
            LocatorSpec::TestId(id) => {
                require(id, "data-testid 值")?;
                let lit = xpath_literal(id);
                Ok(Query::XPath(format!("//*[@data-testid = {lit}]")))
            }
            LocatorSpec::Role { role, name } => {
                require(role, "角色名")?;
                let axis = role_axis(role);
                match name {
                    Some(n) => {
                        require(n, "角色的可见名称")?;
                        let lit = xpath_literal(n);
                        Ok(Query::XPath(format!(
                            "({axis})[normalize-space(.) = {lit} or @aria-label = {lit} or @value = {lit}]",
                        )))
                    }
                    None => Ok(Query::XPath(format!("({axis})"))),
                }
            }
        }
    }
}

impl fmt::Display for LocatorSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LocatorSpec::Css(s) => write!(f, "css:{}", s),
            LocatorSpec::XPath(s) => write!(f, "xpath:{}", s),
            LocatorSpec::Label(s) => write!(f, "label:{}", s),
            LocatorSpec::Placeholder(s) => write!(f, "placeholder:{}", s),
            LocatorSpec::Text(s) => write!(f, "text:{}", s),
            LocatorSpec::TestId(s) => write!(f, "testid:{}", s),
            LocatorSpec::Role { role, name } => match name {
                Some(n) => write!(f, "role:{}[name={}]", role, n),
                None => write!(f, "role:{}", role),
            },
        }
    }
}

fn require(value: &str, what: &'static str) -> Result<(), LocatorError> {
    if value.trim().is_empty() {
        Err(LocatorError::Empty { what })
    } else {
        Ok(())
    }
}

/// 常见角色的隐式标签映射；未列出的角色只按 @role 属性匹配
fn role_axis(role: &str) -> String {
    let lit = xpath_literal(role);
    match role {
        "button" => format!(
            "//button | //input[@type='button' or @type='submit'] | //*[@role = {lit}]"
        ),
        "link" => format!("//a[@href] | //*[@role = {lit}]"),
        "textbox" => format!(
            "//input[not(@type) or @type='text'] | //textarea | //*[@role = {lit}]"
        ),
        "checkbox" => format!("//input[@type='checkbox'] | //*[@role = {lit}]"),
        _ => format!("//*[@role = {lit}]"),
    }
}

/// 把任意字符串转成合法的 XPath 字符串字面量
///
/// XPath 1.0 没有转义语法，同时含有单双引号时需要用 concat() 拼接。
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        return format!("'{}'", value);
    }
    if !value.contains('"') {
        return format!("\"{}\"", value);
    }
    let mut parts = Vec::new();
    for (i, piece) in value.split('\'').enumerate() {
        if i > 0 {
            parts.push("\"'\"".to_string());
        }
        if !piece.is_empty() {
            parts.push(format!("'{}'", piece));
        }
    }
    format!("concat({})", parts.join(", "))
}
