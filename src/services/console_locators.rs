//! 控制台选择器表 - 业务能力层
//!
//! 集中维护作业控制台各元素的定位器；驱动只按语义名使用，
//! 控制台改版时只改这一处。

use crate::models::locator::LocatorSpec;

/// 作业控制台的元素定位器
#[derive(Debug, Clone)]
pub struct ConsoleLocators {
    /// 登录页用户名输入框
    pub username_input: LocatorSpec,
    /// 登录页密码输入框
    pub password_input: LocatorSpec,
    /// 登录按钮
    pub login_button: LocatorSpec,
    /// 作业页的运行按钮
    pub run_button: LocatorSpec,
    /// 作业整体成功的标记
    pub success_marker: LocatorSpec,
    /// 导航错误页的标记
    pub interstitial_marker: LocatorSpec,
    /// 文件输入控件
    pub file_input: LocatorSpec,
    /// 查看日志按钮
    pub view_log_button: LocatorSpec,
    /// 日志内容行
    pub log_lines: LocatorSpec,
}

impl Default for ConsoleLocators {
    fn default() -> Self {
        Self {
            username_input: LocatorSpec::Css("input[name='j_username']".to_string()),
            password_input: LocatorSpec::Css("input[name='j_password']".to_string()),
            login_button: LocatorSpec::Css("#btn-login".to_string()),
            run_button: LocatorSpec::Css("#execFormRunButton".to_string()),
            success_marker: LocatorSpec::Css(
                "span.execstate.overall[data-execstate='SUCCEEDED']".to_string(),
            ),
            interstitial_marker: LocatorSpec::Css("#main-frame-error".to_string()),
            file_input: LocatorSpec::Css("input[type='file']".to_string()),
            view_log_button: LocatorSpec::Css("#btn_view_output".to_string()),
            log_lines: LocatorSpec::Css("span.execution-log__content-text".to_string()),
        }
    }
}

impl ConsoleLocators {
    /// 某个作业参数的输入框；控制台按 `extra.option.<参数名>` 命名
    pub fn parameter_input(&self, name: &str) -> LocatorSpec {
        LocatorSpec::Css(format!("input[name='extra.option.{}']", name))
    }
}
