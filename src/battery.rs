use crate::config::{PowerConfig, ADC_MAX};

/// Converts raw ADC counts to the voltage in front of the divider.
pub fn adc_to_volts(raw: u16, config: &PowerConfig) -> f32 {
    (raw.min(ADC_MAX) as f32) / (ADC_MAX as f32) * config.vref * config.divider
}

#[cfg(target_os = "espidf")]
pub use self::esp::Battery;

#[cfg(target_os = "espidf")]
mod esp {
    use esp_idf_hal::{
        adc::{Adc, AdcChannelDriver, AdcConfig, AdcDriver},
        gpio::ADCPin,
        peripheral::Peripheral,
        sys::EspError,
    };

    use super::adc_to_volts;
    use crate::{config::PowerConfig, error::SensorError, sensors::VoltageSensor};

    pub struct Battery<ADC, V>
    where
        ADC: Adc + 'static,
        V: ADCPin,
    {
        adc_driver: AdcDriver<'static, ADC>,
        adc_channel_driver: AdcChannelDriver<'static, 3, V>,
        config: PowerConfig,
    }

    impl<ADC, V> Battery<ADC, V>
    where
        ADC: Adc + 'static,
        V: ADCPin<Adc = ADC>,
    {
        pub fn new(
            adc: impl Peripheral<P = ADC> + 'static,
            adc_pin: V,
            config: PowerConfig,
        ) -> Result<Self, EspError> {
            let adc_config = AdcConfig::new().calibration(true);
            let adc_driver = AdcDriver::new(adc, &adc_config)?;
            let adc_channel_driver = AdcChannelDriver::new(adc_pin)?;
            Ok(Self {
                adc_driver,
                adc_channel_driver,
                config,
            })
        }
    }

    impl<ADC, V> VoltageSensor for Battery<ADC, V>
    where
        ADC: Adc + 'static,
        V: ADCPin<Adc = ADC>,
    {
        fn read_voltage(&mut self) -> Result<f32, SensorError> {
            let raw = self
                .adc_driver
                .read_raw(&mut self.adc_channel_driver)
                .map_err(|_| SensorError::Bus)?;
            Ok(adc_to_volts(raw, &self.config))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn full_scale_is_vref_times_divider() {
        let volts = adc_to_volts(ADC_MAX, &PowerConfig::default());
        assert!((volts - 6.6).abs() < 1e-5);
    }

    #[test]
    fn zero_counts_is_zero_volts() {
        assert_eq!(adc_to_volts(0, &PowerConfig::default()), 0.0);
    }

    #[test]
    fn mid_scale() {
        let config = PowerConfig {
            vref: 3.3,
            divider: 1.0,
        };
        let volts = adc_to_volts(2048, &config);
        assert!((volts - 1.6504).abs() < 1e-3, "{volts}");
    }

    #[test]
    fn counts_above_full_scale_are_clamped() {
        let config = PowerConfig::default();
        assert_eq!(adc_to_volts(u16::MAX, &config), adc_to_volts(ADC_MAX, &config));
    }
}
