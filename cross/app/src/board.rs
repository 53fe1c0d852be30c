#![deny(unsafe_code)]

use crate::acquisition::Tdc;
use crate::error::Error;
use crate::hw::{LaserPulser, QuadratureEncoder, PULSE_FREQ};
use crate::speed::EngineMotor;
use crate::system_time::Ticker;

use board::{EncoderA, EncoderB, EncoderIndex, LaserAlert, LaserPin, MotorPwmPin, SerialTx, TdcInterrupt};
use engine::ControllerConfig;
use rtt_target::rprintln;
use scanner::INC_PER_TURN;
use stm32f1xx_hal::gpio::{Edge, ExtiPin};
use stm32f1xx_hal::pac;
use stm32f1xx_hal::prelude::*;
use stm32f1xx_hal::qei::{QeiOptions, SlaveMode};
use stm32f1xx_hal::serial::{Config, Serial};
use stm32f1xx_hal::spi::Spi;
use stm32f1xx_hal::time::Hertz;
use stm32f1xx_hal::timer::Timer;

const MOTOR_PWM_FREQ: Hertz = Hertz::kHz(20);
const SPI_FREQ: Hertz = Hertz::MHz(4);

pub struct Board {
    pub ticker: Ticker,
    pub tdc: Tdc,
    pub tdc_irq: TdcInterrupt,
    pub encoder: QuadratureEncoder,
    pub index: EncoderIndex,
    pub laser: LaserPulser,
    pub laser_alert: LaserAlert,
    pub motor: EngineMotor,
    pub serial_tx: SerialTx,
}

impl Board {
    pub fn new(cp: pac::CorePeripherals, dp: pac::Peripherals) -> Result<Self, Error> {
        // Enable debug while sleeping to keep probe-rs happy while WFI
        dp.DBGMCU.cr.modify(|_, w| {
            w.dbg_sleep().set_bit();
            w.dbg_standby().set_bit();
            w.dbg_stop().set_bit()
        });

        // Configure the clock.
        let mut flash = dp.FLASH.constrain();
        let rcc = dp.RCC.constrain();
        let clocks = rcc
            .cfgr
            .use_hse(8.MHz())
            .sysclk(72.MHz())
            .pclk1(36.MHz())
            .freeze(&mut flash.acr);

        let mut afio = dp.AFIO.constrain();
        let mut exti = dp.EXTI;

        // Acquire the GPIO peripherals.
        let mut gpioa = dp.GPIOA.split();
        let mut gpiob = dp.GPIOB.split();

        // Disable JTAG to get PB4 for the motor alert
        let (_, _, pb4) = afio.mapr.disable_jtag(gpioa.pa15, gpiob.pb3, gpiob.pb4);

        // Time-to-digital converter
        let spi_cs = gpiob.pb12.into_push_pull_output(&mut gpiob.crh);
        let spi_clk = gpiob.pb13.into_alternate_push_pull(&mut gpiob.crh);
        let spi_miso = gpiob.pb14.into_floating_input(&mut gpiob.crh);
        let spi_mosi = gpiob.pb15.into_alternate_push_pull(&mut gpiob.crh);

        let spi = Spi::spi2(
            dp.SPI2,
            (spi_clk, spi_miso, spi_mosi),
            embedded_hal::spi::MODE_1,
            SPI_FREQ,
            clocks,
        );

        let mut tdc = Tdc::new(spi, spi_cs, gp22::Config::default());
        tdc.configure()?;
        tdc.check_communication()?;
        rprintln!("tdc configured");

        let mut tdc_irq: TdcInterrupt = gpiob.pb1.into_pull_up_input(&mut gpiob.crl);
        tdc_irq.make_interrupt_source(&mut afio);
        tdc_irq.trigger_on_edge(&mut exti, Edge::Falling);
        tdc_irq.enable_interrupt(&mut exti);

        // Mirror encoder
        let encoder_a: EncoderA = gpioa.pa8.into_floating_input(&mut gpioa.crh);
        let encoder_b: EncoderB = gpioa.pa9.into_floating_input(&mut gpioa.crh);
        let qei = Timer::new(dp.TIM1, &clocks).qei(
            (encoder_a, encoder_b),
            &mut afio.mapr,
            QeiOptions {
                slave_mode: SlaveMode::EncoderMode3,
                auto_reload_value: INC_PER_TURN - 1,
            },
        );
        let (tim1, _) = qei.release();
        let encoder = QuadratureEncoder::new(tim1);

        let mut index: EncoderIndex = gpiob.pb0.into_pull_up_input(&mut gpiob.crl);
        index.make_interrupt_source(&mut afio);
        index.trigger_on_edge(&mut exti, Edge::Falling);
        index.enable_interrupt(&mut exti);

        // Laser
        let laser_pin: LaserPin = gpioa.pa0.into_alternate_push_pull(&mut gpioa.crl);
        let laser_pwm = dp
            .TIM2
            .pwm_hz(laser_pin, &mut afio.mapr, PULSE_FREQ, &clocks)
            .split();
        let pulse_counter = dp.TIM4.counter_hz(&clocks);
        let laser = LaserPulser::new(laser_pwm, pulse_counter)?;
        let laser_alert: LaserAlert = gpioa.pa1.into_pull_up_input(&mut gpioa.crl);

        // Mirror motor
        let motor_pin: MotorPwmPin = gpioa.pa6.into_alternate_push_pull(&mut gpioa.crl);
        let motor_pwm = dp
            .TIM3
            .pwm_hz(motor_pin, &mut afio.mapr, MOTOR_PWM_FREQ, &clocks)
            .split();
        rprintln!("motor pwm max duty {}", motor_pwm.get_max_duty());

        let motor = EngineMotor::new(
            motor_pwm,
            gpiob.pb10.into_push_pull_output(&mut gpiob.crh),
            gpiob.pb11.into_push_pull_output(&mut gpiob.crh),
            gpiob.pb5.into_push_pull_output(&mut gpiob.crl),
            pb4.into_pull_up_input(&mut gpiob.crl),
            ControllerConfig::default().max_power as u32,
        )?;

        // Point stream
        let serial_tx = gpioa.pa2.into_alternate_push_pull(&mut gpioa.crl);
        let serial_rx = gpioa.pa3.into_floating_input(&mut gpioa.crl);
        let serial = Serial::new(
            dp.USART2,
            (serial_tx, serial_rx),
            &mut afio.mapr,
            Config::default()
                .baudrate(115200.bps())
                .wordlength_8bits()
                .parity_none(),
            &clocks,
        );
        let (serial_tx, _) = serial.split();

        let ticker = Ticker::new(cp.SYST, &clocks);

        Ok(Board {
            ticker,
            tdc,
            tdc_irq,
            encoder,
            index,
            laser,
            laser_alert,
            motor,
            serial_tx,
        })
    }
}
